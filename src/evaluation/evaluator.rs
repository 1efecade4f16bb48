//! Scores a persisted model on the test split

use crate::error::{PipelineError, Result};
use crate::export::{manifest_path_for, FeatureManifest, ModelArtifact};
use crate::training::{
    binary_target, ClassificationReport, ModelMetrics, ModelType, DECISION_THRESHOLD,
};
use crate::utils::{load_test_split, require_column};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Metrics and per-class report of one evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub model_type: ModelType,
    pub metrics: ModelMetrics,
    pub classification_report: ClassificationReport,
    /// Positive-class probability per test row
    pub probabilities: Vec<f64>,
    /// Hard label per test row
    pub predictions: Vec<f64>,
}

impl EvaluationReport {
    pub fn n_samples(&self) -> usize {
        self.metrics.n_samples
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.metrics;
        writeln!(f, "=== Test Set Evaluation ({}) ===", self.model_type)?;
        writeln!(f, "Samples:   {}", m.n_samples)?;
        writeln!(f, "Accuracy:  {:.4}", m.accuracy)?;
        writeln!(f, "Precision: {:.4}", m.precision)?;
        writeln!(f, "Recall:    {:.4}", m.recall)?;
        writeln!(f, "F1 Score:  {:.4}", m.f1_score)?;
        match m.auc_roc {
            Some(auc) => writeln!(f, "AUC-ROC:   {:.4}", auc)?,
            None => writeln!(f, "AUC-ROC:   n/a (single class)")?,
        }
        writeln!(f)?;
        writeln!(f, "Confusion Matrix:")?;
        writeln!(f, "{}", m.confusion_matrix)?;
        writeln!(f)?;
        writeln!(f, "Classification Report:")?;
        write!(f, "{}", self.classification_report)
    }
}

/// Holds a loaded model and its manifest
#[derive(Debug, Clone)]
pub struct Evaluator {
    artifact: ModelArtifact,
    manifest: FeatureManifest,
    target_column: String,
}

impl Evaluator {
    pub fn new(artifact: ModelArtifact, manifest: FeatureManifest) -> Self {
        let target_column = artifact.metadata.target_name.clone();
        Self {
            artifact,
            manifest,
            target_column,
        }
    }

    /// Load the model and manifest; either file missing is `FileNotFound`
    pub fn load(model_path: impl AsRef<Path>, manifest_path: impl AsRef<Path>) -> Result<Self> {
        let artifact = ModelArtifact::load(model_path.as_ref())?;
        let manifest = FeatureManifest::load(manifest_path.as_ref())?;
        debug!(
            model = %artifact.metadata.model_type,
            features = manifest.len(),
            "Loaded model and manifest"
        );
        Ok(Self::new(artifact, manifest))
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_column = target.into();
        self
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn manifest(&self) -> &FeatureManifest {
        &self.manifest
    }

    /// Feature columns of `df` checked against the manifest and put in
    /// manifest order. `df` must already exclude the target.
    pub fn align(&self, features: &DataFrame) -> Result<DataFrame> {
        if features.width() != self.manifest.len() {
            return Err(PipelineError::FeatureMismatch(format!(
                "expected {} feature columns, found {}",
                self.manifest.len(),
                features.width()
            )));
        }

        let present: HashSet<&str> = features
            .get_column_names()
            .into_iter()
            .map(|s| s.as_str())
            .collect();
        let missing: Vec<&str> = self
            .manifest
            .features()
            .iter()
            .map(|s| s.as_str())
            .filter(|name| !present.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::FeatureMismatch(format!(
                "missing training features: {}",
                missing.join(", ")
            )));
        }

        Ok(features.select(self.manifest.features().iter().map(|s| s.as_str()))?)
    }

    /// Score the test table (target required)
    pub fn evaluate(&self, test: &DataFrame) -> Result<EvaluationReport> {
        let start = Instant::now();
        require_column(test, &self.target_column)?;

        let y = binary_target(test, &self.target_column)?;
        let features = self.align(&test.drop(&self.target_column)?)?;

        let probabilities = self.artifact.pipeline.predict_proba(&features)?;
        let predictions: Array1<f64> =
            probabilities.mapv(|p| if p >= DECISION_THRESHOLD { 1.0 } else { 0.0 });

        let mut metrics =
            ModelMetrics::compute_classification(&y, &predictions, Some(&probabilities));
        metrics.n_features = self.manifest.len();
        let classification_report = ClassificationReport::from_confusion(&metrics.confusion_matrix);

        info!(
            rows = y.len(),
            accuracy = metrics.accuracy,
            auc = ?metrics.auc_roc,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Evaluated model on test split"
        );

        Ok(EvaluationReport {
            model_type: self.artifact.pipeline.model_type(),
            metrics,
            classification_report,
            probabilities: probabilities.to_vec(),
            predictions: predictions.to_vec(),
        })
    }
}

/// Load model, manifest and the test split, then evaluate
///
/// Only the test split of `test_path` is read. Without `manifest_path`
/// the manifest is looked up beside the model.
pub fn evaluate_model(
    model_path: impl AsRef<Path>,
    manifest_path: Option<&Path>,
    test_path: impl AsRef<Path>,
) -> Result<EvaluationReport> {
    let model_path = model_path.as_ref();
    let manifest_path = manifest_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| manifest_path_for(model_path));

    let evaluator = Evaluator::load(model_path, &manifest_path)?;
    let test = load_test_split(test_path)?;
    evaluator.evaluate(&test)
}
