//! Shared fixtures for integration tests

#![allow(dead_code)]

use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use readmit_automl::config::{ArtifactPaths, PipelineConfig};
use readmit_automl::training::{ModelType, TrainingConfig};
use std::fs::File;
use std::path::Path;

pub const TARGET: &str = "readmitted";

const CATEGORIES: [&str; 3] = ["a", "b", "c"];

/// Balanced two-class table: 10 numeric + 5 categorical features and the target
///
/// The label alternates by row; `num_0`, `num_1` and `cat_0` carry signal.
pub fn patient_table(n_rows: usize, seed: u64) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let labels: Vec<i64> = (0..n_rows).map(|i| (i % 2) as i64).collect();

    let mut columns: Vec<Column> = Vec::with_capacity(16);
    for j in 0..10 {
        let values: Vec<f64> = labels
            .iter()
            .map(|&label| {
                let noise: f64 = rng.gen_range(-1.0..1.0);
                match j {
                    0 => label as f64 * 1.5 + noise,
                    1 => -(label as f64) + noise * 0.8,
                    _ => noise * 3.0 + j as f64,
                }
            })
            .collect();
        columns.push(Column::new(format!("num_{}", j).into(), values));
    }

    for j in 0..5 {
        let values: Vec<&str> = labels
            .iter()
            .map(|&label| {
                if j == 0 && rng.gen_bool(0.8) {
                    if label == 1 { "c" } else { "a" }
                } else {
                    CATEGORIES[rng.gen_range(0..CATEGORIES.len())]
                }
            })
            .collect();
        columns.push(Column::new(format!("cat_{}", j).into(), values));
    }

    columns.push(Column::new(TARGET.into(), labels));
    DataFrame::new(columns).unwrap()
}

/// Small, fast training settings
pub fn fast_training() -> TrainingConfig {
    TrainingConfig::new(TARGET)
        .with_n_estimators(30)
        .with_max_depth(3)
        .with_forest_estimators(15)
        .with_random_state(7)
}

pub fn fast_config(dir: &Path) -> PipelineConfig {
    PipelineConfig::default()
        .with_paths(ArtifactPaths::under(dir))
        .with_target(TARGET)
        .with_training(fast_training().with_model(ModelType::Auto))
}

pub fn write_csv(df: &DataFrame, path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut file = File::create(path).unwrap();
    CsvWriter::new(&mut file).finish(&mut df.clone()).unwrap();
}
