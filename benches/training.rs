use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use readmit_automl::training::{ModelType, TrainEngine, TrainingConfig};

fn create_patient_data(n_rows: usize, n_features: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let labels: Vec<i64> = (0..n_rows).map(|i| (i % 2) as i64).collect();

    let mut columns: Vec<Column> = (0..n_features)
        .map(|j| {
            let values: Vec<f64> = labels
                .iter()
                .map(|&label| {
                    let noise = rng.gen::<f64>() * 2.0 - 1.0;
                    if j == 0 { label as f64 + noise } else { noise * 5.0 }
                })
                .collect();
            Column::new(format!("feature_{}", j).into(), values)
        })
        .collect();

    let admission: Vec<&str> = (0..n_rows)
        .map(|_| ["emergency", "urgent", "elective"][rng.gen_range(0..3)])
        .collect();
    columns.push(Column::new("admission_type".into(), admission));
    columns.push(Column::new("readmitted".into(), labels));

    DataFrame::new(columns).unwrap()
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [1000, 5000].iter() {
        let df = create_patient_data(*n_rows, 10);

        for model in [ModelType::GradientBoosting, ModelType::LogisticRegression, ModelType::RandomForest] {
            group.bench_with_input(
                BenchmarkId::new(model.as_str(), n_rows),
                &df,
                |b, df| {
                    b.iter(|| {
                        let config = TrainingConfig::new("readmitted")
                            .with_model(model)
                            .with_n_estimators(100)
                            .with_forest_estimators(50);
                        TrainEngine::new(config).train(black_box(df), None).unwrap()
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train model once
    let train_df = create_patient_data(5000, 10);
    let config = TrainingConfig::new("readmitted").with_n_estimators(100);
    let outcome = TrainEngine::new(config).train(&train_df, None).unwrap();

    for n_rows in [100, 1000, 10000].iter() {
        let test_df = create_patient_data(*n_rows, 10).drop("readmitted").unwrap();

        group.bench_with_input(
            BenchmarkId::new("predict_proba", n_rows),
            &test_df,
            |b, df| {
                b.iter(|| {
                    outcome.pipeline.predict_proba(black_box(df)).unwrap()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_training, bench_prediction);
criterion_main!(benches);
