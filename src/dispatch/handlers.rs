//! The three delegates a request can be routed to

use crate::analysis::{read_artifact, AnalysisArtifact, AnalysisProducer, DatasetPaths};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::evaluation::{evaluate_model, EvaluationReport, Evaluator};
use crate::export::{save_json, FeatureManifest, ModelArtifact};
use crate::training::{ModelType, TrainEngine, TrainingOutcome};
use crate::utils::{load_test_split, load_train_split};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Majority/minority ratio above which the report flags imbalance
pub const IMBALANCE_NOTE_THRESHOLD: f64 = 1.5;

/// Folds used by the modeling workflow when the config leaves CV off
const MODELING_CV_FOLDS: usize = 5;

/// What every handler needs: configuration and the dataset location
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    pub config: PipelineConfig,
    /// Train file or dataset-store directory
    pub dataset: Option<PathBuf>,
    /// Separate test file; a store directory supplies its own test split
    pub test: Option<PathBuf>,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            dataset: None,
            test: None,
        }
    }

    pub fn with_dataset(mut self, dataset: impl Into<PathBuf>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    pub fn with_test(mut self, test: impl Into<PathBuf>) -> Self {
        self.test = Some(test.into());
        self
    }

    /// Train and test locations for a fresh analysis
    fn dataset_paths(&self) -> Result<DatasetPaths> {
        let train = self.dataset.clone().ok_or_else(|| {
            PipelineError::ConfigError("no dataset path given for analysis".to_string())
        })?;
        let test = match &self.test {
            Some(test) => Some(test.clone()),
            None if train.is_dir() => Some(train.clone()),
            None => None,
        };
        Ok(DatasetPaths::new(train, test))
    }

    /// Test location from the context, else from the analysis artifact
    fn test_path(&self) -> Option<PathBuf> {
        if let Some(test) = &self.test {
            return Some(test.clone());
        }
        if let Some(dataset) = self.dataset.as_ref().filter(|d| d.is_dir()) {
            return Some(dataset.clone());
        }
        read_artifact(&self.config.paths.analysis)
            .ok()
            .and_then(|a| a.dataset_paths.test)
    }
}

/// Accuracy and AUC pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScorePair {
    pub accuracy: Option<f64>,
    pub auc: Option<f64>,
}

/// Report written by the modeling workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelingReport {
    pub model: String,
    pub reasoning: String,
    pub cv_scores: ScorePair,
    pub test_scores: ScorePair,
    /// Raw column -> summed importance
    pub feature_importance: BTreeMap<String, f64>,
    pub notes: Vec<String>,
}

impl ModelingReport {
    fn build(outcome: &TrainingOutcome, test: Option<&EvaluationReport>) -> Self {
        let selected = outcome.selected_score();
        let cv = selected.and_then(|s| s.cv.as_ref());

        let succeeded = outcome.candidates.iter().filter(|c| c.succeeded()).count();
        let reasoning = match outcome.validation_auc() {
            Some(auc) => format!(
                "{} had the highest validation AUC ({:.4}) of {} trained candidates; refit on the full train split",
                outcome.selected, auc, succeeded
            ),
            None => format!(
                "{} selected; validation AUC undefined for a single-class hold-out",
                outcome.selected
            ),
        };

        let mut notes = Vec::new();
        if let Some(ratio) = outcome.imbalance_ratio() {
            if ratio > IMBALANCE_NOTE_THRESHOLD {
                notes.push(format!(
                    "Class imbalance: majority/minority ratio is {:.2}; accuracy alone overstates performance",
                    ratio
                ));
            }
        }
        for failed in outcome.candidates.iter().filter(|c| !c.succeeded()) {
            notes.push(format!(
                "{} failed: {}",
                failed.model_type,
                failed.error.as_deref().unwrap_or("unknown error")
            ));
        }
        if test.is_none() {
            notes.push("No test split available; test scores are empty".to_string());
        }

        Self {
            model: outcome.selected.to_string(),
            reasoning,
            cv_scores: ScorePair {
                accuracy: cv.map(|c| c.accuracy.mean_score),
                auc: cv.map(|c| c.auc.mean_score),
            },
            test_scores: test
                .map(|r| ScorePair {
                    accuracy: Some(r.metrics.accuracy),
                    auc: r.metrics.auc_roc,
                })
                .unwrap_or_default(),
            feature_importance: outcome.pipeline.column_importances().unwrap_or_default(),
            notes,
        }
    }
}

/// Analyze the train split and write the artifact
pub fn global_analysis(ctx: &PipelineContext) -> Result<Value> {
    let paths = ctx.dataset_paths()?;
    let df = load_train_split(&paths.train)?;
    let artifact = AnalysisProducer::new(ctx.config.target_column.clone()).run(
        &df,
        paths,
        &ctx.config.paths.analysis,
    )?;

    Ok(json!({
        "artifact": ctx.config.paths.analysis,
        "num_samples": artifact.num_samples,
        "num_columns": artifact.features.len(),
        "class_distribution": artifact.class_distribution,
        "imbalance_ratio": artifact.imbalance_ratio(),
    }))
}

/// Train, select, persist, score on test and write the modeling report
///
/// Runs the analysis first when its artifact is absent.
pub fn model_training(ctx: &PipelineContext) -> Result<Value> {
    let report = run_modeling(ctx)?;
    Ok(serde_json::to_value(report)?)
}

/// Typed form of [`model_training`]
pub fn run_modeling(ctx: &PipelineContext) -> Result<ModelingReport> {
    let paths = &ctx.config.paths;
    let artifact = ensure_analysis(ctx)?;

    let train = load_train_split(&artifact.dataset_paths.train)?;

    let mut training = ctx.config.training.clone().with_model(ModelType::Auto);
    if training.cv_folds < 2 {
        training = training.with_cv(MODELING_CV_FOLDS);
    }
    let engine = TrainEngine::new(training).with_preprocessing(ctx.config.preprocessing.clone());
    let outcome = engine.train(&train, Some(&artifact))?;

    let model = ModelArtifact::from_outcome(&outcome, &ctx.config.target_column);
    let manifest = FeatureManifest::new(outcome.manifest.clone());
    model.save(&paths.model)?;
    manifest.save(paths.manifest_path())?;
    info!(path = %paths.model.display(), model = %outcome.selected, "Model persisted");

    let test_report = match &artifact.dataset_paths.test {
        Some(test_path) => {
            let test = load_test_split(test_path)?;
            Some(Evaluator::new(model, manifest).evaluate(&test)?)
        }
        None => {
            warn!("Analysis artifact records no test split; skipping test scoring");
            None
        }
    };

    let report = ModelingReport::build(&outcome, test_report.as_ref());
    save_json(&report, &paths.report)?;
    info!(path = %paths.report.display(), "Modeling report written");
    Ok(report)
}

/// Score the persisted model on the test split
pub fn model_evaluation(ctx: &PipelineContext) -> Result<Value> {
    let paths = &ctx.config.paths;
    if !paths.model.is_file() {
        return Err(PipelineError::FileNotFound(paths.model.clone()));
    }
    let test = ctx.test_path().ok_or_else(|| {
        PipelineError::ConfigError("no test split known for evaluation".to_string())
    })?;

    let manifest = paths.manifest_path();
    let report = evaluate_model(&paths.model, Some(manifest.as_path()), &test)?;
    Ok(json!({
        "model": report.model_type,
        "test_path": test,
        "metrics": report.metrics,
        "classification_report": report.classification_report,
    }))
}

/// Read the analysis artifact, producing it first when absent
///
/// An artifact recorded for a different train path than `ctx.dataset` is
/// stale and the analysis is run again.
fn ensure_analysis(ctx: &PipelineContext) -> Result<AnalysisArtifact> {
    let path: &Path = &ctx.config.paths.analysis;
    if !path.is_file() {
        info!(path = %path.display(), "No analysis artifact; running analysis first");
        global_analysis(ctx)?;
        return read_artifact(path);
    }

    let artifact = read_artifact(path)?;
    match &ctx.dataset {
        Some(dataset) if *dataset != artifact.dataset_paths.train => {
            warn!(
                recorded = %artifact.dataset_paths.train.display(),
                requested = %dataset.display(),
                "Analysis artifact describes another dataset; running analysis again"
            );
            global_analysis(ctx)?;
            read_artifact(path)
        }
        _ => Ok(artifact),
    }
}
