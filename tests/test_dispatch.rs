//! Integration test: request routing and the delegated workflows

mod common;

use common::{fast_config, patient_table, TARGET};
use polars::prelude::*;
use readmit_automl::dispatch::{classify, DispatchTable, ModelingReport, PipelineContext, TaskKind};
use readmit_automl::error::PipelineError;
use readmit_automl::analysis::read_artifact;
use readmit_automl::export::load_json;
use readmit_automl::utils::DatasetStore;
use std::path::Path;
use tempfile::tempdir;

fn write_store(base: &Path, train: DataFrame, test: DataFrame) {
    DatasetStore::create(base, &mut [("train", train), ("test", test)]).unwrap();
}

#[test]
fn test_routing_phrases() {
    assert_eq!(classify("analyze the dataset").unwrap(), TaskKind::Analysis);
    assert_eq!(classify("train a classifier").unwrap(), TaskKind::Modeling);
    assert_eq!(
        classify("evaluate the model on the test set").unwrap(),
        TaskKind::Evaluation
    );
    assert!(matches!(
        classify("book a meeting room"),
        Err(PipelineError::UnroutableRequest(_))
    ));
}

#[test]
fn test_analysis_then_modeling_then_evaluation() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("dataset");
    write_store(&store, patient_table(300, 31), patient_table(100, 32));

    let config = fast_config(&dir.path().join("artifacts"));
    let paths = config.paths.clone();
    let ctx = PipelineContext::new(config).with_dataset(&store);
    let table = DispatchTable::new();

    let analysis = table.dispatch(&ctx, "analyze the dataset").unwrap();
    assert_eq!(analysis.delegate, "global_analysis");
    assert_eq!(analysis.result["num_samples"], 300);
    assert!(paths.analysis.is_file());

    let modeling = table.dispatch(&ctx, "train a classifier").unwrap();
    assert_eq!(modeling.delegate, "model_training");
    assert!(paths.model.is_file());
    assert!(paths.manifest_path().is_file());

    let report: ModelingReport = load_json(&paths.report).unwrap();
    assert_eq!(serde_json::to_value(&report).unwrap(), modeling.result);
    assert!(["gradient_boosting", "logistic_regression", "random_forest"]
        .contains(&report.model.as_str()));
    assert!(report.cv_scores.auc.is_some());
    let test_auc = report.test_scores.auc.unwrap();
    assert!((0.0..=1.0).contains(&test_auc));
    assert!(!report.feature_importance.is_empty());
    assert!(!report.feature_importance.contains_key(TARGET));

    let evaluation = table
        .dispatch(&ctx, "evaluate the model on the test set")
        .unwrap();
    assert_eq!(evaluation.delegate, "model_evaluation");
    assert_eq!(evaluation.result["metrics"]["n_samples"], 100);
}

#[test]
fn test_modeling_runs_analysis_when_artifact_missing() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("dataset");
    write_store(&store, patient_table(200, 33), patient_table(80, 34));

    let config = fast_config(&dir.path().join("artifacts"));
    let paths = config.paths.clone();
    assert!(!paths.analysis.exists());

    let ctx = PipelineContext::new(config).with_dataset(&store);
    let delegation = DispatchTable::new()
        .dispatch(&ctx, "fit a gradient boosting model")
        .unwrap();

    assert_eq!(delegation.delegate, "model_training");
    assert!(paths.analysis.is_file());
    assert!(paths.report.is_file());
}

#[test]
fn test_imbalance_is_noted() {
    let full = patient_table(600, 35);
    let keep: Vec<bool> = (0..full.height()).map(|i| i % 2 == 0 || i % 6 == 1).collect();
    let imbalanced = full
        .filter(&BooleanChunked::from_slice("keep".into(), &keep))
        .unwrap();

    let dir = tempdir().unwrap();
    let store = dir.path().join("dataset");
    write_store(&store, imbalanced.clone(), imbalanced.slice(0, 120));

    let config = fast_config(&dir.path().join("artifacts"));
    let report_path = config.paths.report.clone();
    let ctx = PipelineContext::new(config).with_dataset(&store);
    DispatchTable::new().dispatch(&ctx, "train a classifier").unwrap();

    let report: ModelingReport = load_json(&report_path).unwrap();
    assert!(report.notes.iter().any(|n| n.contains("imbalance")));
}

#[test]
fn test_analysis_without_dataset_fails() {
    let dir = tempdir().unwrap();
    let ctx = PipelineContext::new(fast_config(dir.path()));
    assert!(matches!(
        DispatchTable::new().dispatch(&ctx, "analyze the dataset"),
        Err(PipelineError::ConfigError(_))
    ));
}

#[test]
fn test_modeling_reanalyzes_a_different_dataset() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    write_store(&first, patient_table(150, 36), patient_table(60, 37));
    write_store(&second, patient_table(220, 38), patient_table(60, 39));

    let config = fast_config(&dir.path().join("artifacts"));
    let paths = config.paths.clone();
    let table = DispatchTable::new();

    let ctx = PipelineContext::new(config.clone()).with_dataset(&first);
    table.dispatch(&ctx, "analyze the dataset").unwrap();
    assert_eq!(read_artifact(&paths.analysis).unwrap().num_samples, 150);

    let ctx = PipelineContext::new(config).with_dataset(&second);
    table.dispatch(&ctx, "train a classifier").unwrap();

    let artifact = read_artifact(&paths.analysis).unwrap();
    assert_eq!(artifact.dataset_paths.train, second);
    assert_eq!(artifact.num_samples, 220);
}
