//! Integration test: analysis artifact

mod common;

use common::{patient_table, write_csv, TARGET};
use polars::prelude::*;
use readmit_automl::analysis::{read_artifact, AnalysisProducer, DatasetPaths};
use readmit_automl::error::PipelineError;
use readmit_automl::preprocessing::ColumnKind;
use readmit_automl::training::TrainEngine;
use readmit_automl::utils::load_train_split;
use tempfile::tempdir;

#[test]
fn test_class_counts_sum_to_rows() {
    let df = patient_table(240, 21);
    let artifact = AnalysisProducer::new(TARGET)
        .analyze(&df, DatasetPaths::new("data/train.csv", None))
        .unwrap();

    assert_eq!(artifact.num_samples, 240);
    assert_eq!(artifact.class_distribution.values().sum::<usize>(), 240);
    assert_eq!(artifact.class_distribution.get("0"), Some(&120));
    assert_eq!(artifact.class_distribution.get("1"), Some(&120));
    assert_eq!(artifact.imbalance_ratio(), Some(1.0));
}

#[test]
fn test_kinds_and_missingness() {
    let df = df!(
        "age" => &[Some(70.0), None, Some(55.0), Some(62.0)],
        "race" => &[Some("white"), Some("black"), None, None],
        "insulin" => &[true, false, true, true],
        TARGET => &[1i64, 0, 1, 0]
    )
    .unwrap();

    let artifact = AnalysisProducer::new(TARGET)
        .analyze(&df, DatasetPaths::new("train.csv", None))
        .unwrap();

    assert_eq!(artifact.features.len(), 4);
    assert_eq!(artifact.kind_of("age"), Some(ColumnKind::Numeric));
    assert_eq!(artifact.kind_of("race"), Some(ColumnKind::Categorical));
    assert_eq!(artifact.kind_of("insulin"), Some(ColumnKind::Boolean));
    assert_eq!(artifact.feature("age").unwrap().pct_missing, 25.0);
    assert_eq!(artifact.feature("race").unwrap().pct_missing, 50.0);
    assert_eq!(artifact.feature(TARGET).unwrap().pct_missing, 0.0);
}

#[test]
fn test_correlations_over_numeric_columns() {
    let df = patient_table(300, 22);
    let artifact = AnalysisProducer::new(TARGET)
        .analyze(&df, DatasetPaths::new("train.csv", None))
        .unwrap();

    assert!(!artifact.correlations.contains_key("cat_0"));
    let r = artifact.correlations["num_0"][TARGET].unwrap();
    assert!(r > 0.5, "num_0 tracks the label, got {}", r);
    let self_r = artifact.correlations["num_2"]["num_2"].unwrap();
    assert!((self_r - 1.0).abs() < 1e-9);
}

#[test]
fn test_missing_target_column() {
    let df = df!("age" => &[1.0, 2.0]).unwrap();
    let result = AnalysisProducer::new(TARGET).analyze(&df, DatasetPaths::new("x.csv", None));
    assert!(matches!(result, Err(PipelineError::MissingColumn(_))));
}

#[test]
fn test_artifact_drives_column_kinds_at_training() {
    let dir = tempdir().unwrap();
    let train_path = dir.path().join("train.csv");
    write_csv(&patient_table(200, 23), &train_path);

    let output = dir.path().join("analysis_results/dataset_analysis.json");
    let df = load_train_split(&train_path).unwrap();
    AnalysisProducer::new(TARGET)
        .run(&df, DatasetPaths::new(&train_path, None), &output)
        .unwrap();

    let artifact = read_artifact(&output).unwrap();
    assert_eq!(artifact.dataset_paths.train, train_path);
    assert_eq!(artifact.dataset_paths.base_path, dir.path());

    let outcome = TrainEngine::new(common::fast_training())
        .train(&df, Some(&artifact))
        .unwrap();
    assert_eq!(outcome.pipeline.preprocessor().categorical_columns().len(), 5);
    assert_eq!(outcome.pipeline.preprocessor().numeric_columns().len(), 10);
}
