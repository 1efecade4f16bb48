//! Model and manifest serialization
//!
//! Both artifacts are JSON files. The model file holds metadata plus the
//! fitted pipeline; the manifest is the ordered list of raw feature columns.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::training::{ClassifierPipeline, ModelType, TrainingOutcome};

/// Write `value` as pretty JSON, creating parent directories
pub fn save_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    debug!(path = %path.display(), "Wrote JSON artifact");
    Ok(())
}

/// Read a JSON file; a missing file is `FileNotFound`
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(PipelineError::FileNotFound(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader).map_err(|e| {
        PipelineError::SerializationError(format!("{}: {}", path.display(), e))
    })
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,
    /// Version of the crate that wrote the file
    pub version: String,
    /// Training timestamp
    pub trained_at: DateTime<Utc>,
    pub model_type: ModelType,
    pub target_name: String,
    /// Raw feature columns
    pub n_features: usize,
    pub n_samples: usize,
    pub validation_auc: Option<f64>,
    pub training_auc: Option<f64>,
    /// Mean fold AUC when cross-validation ran
    pub cv_auc: Option<f64>,
}

impl ModelMetadata {
    pub fn new(model_type: ModelType, target: impl Into<String>) -> Self {
        Self {
            name: format!("readmission_{}", model_type.as_str()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: Utc::now(),
            model_type,
            target_name: target.into(),
            n_features: 0,
            n_samples: 0,
            validation_auc: None,
            training_auc: None,
            cv_auc: None,
        }
    }
}

/// Persisted model: metadata plus the fitted pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub pipeline: ClassifierPipeline,
}

impl ModelArtifact {
    pub fn new(metadata: ModelMetadata, pipeline: ClassifierPipeline) -> Self {
        Self { metadata, pipeline }
    }

    /// Build the artifact for a finished training run
    pub fn from_outcome(outcome: &TrainingOutcome, target: &str) -> Self {
        let mut metadata = ModelMetadata::new(outcome.selected, target);
        metadata.n_features = outcome.manifest.len();
        metadata.n_samples = outcome.n_samples;
        metadata.validation_auc = outcome.validation_auc();
        metadata.training_auc = outcome.training_auc;
        metadata.cv_auc = outcome
            .selected_score()
            .and_then(|s| s.cv.as_ref())
            .map(|cv| cv.auc.mean_score);
        Self::new(metadata, outcome.pipeline.clone())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_json(self, path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_json(path)
    }
}

/// Ordered raw feature columns fixed at training time (target excluded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureManifest {
    features: Vec<String>,
}

impl FeatureManifest {
    pub fn new(features: Vec<String>) -> Self {
        Self { features }
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.features.iter().any(|f| f == name)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_json(self, path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load_json(path)
    }
}

/// Default manifest location: `<model stem>.features.json` beside the model
pub fn manifest_path_for(model_path: impl AsRef<Path>) -> PathBuf {
    let model_path = model_path.as_ref();
    let stem = model_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    model_path.with_file_name(format!("{}.features.json", stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_manifest_path_for() {
        assert_eq!(
            manifest_path_for("models/readmission_model.json"),
            PathBuf::from("models/readmission_model.features.json")
        );
        assert_eq!(
            manifest_path_for("model.bin"),
            PathBuf::from("model.features.json")
        );
    }

    #[test]
    fn test_manifest_round_trip_is_plain_list() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/features.json");
        let manifest = FeatureManifest::new(vec!["age".to_string(), "race".to_string()]);
        manifest.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, vec!["age", "race"]);

        let loaded = FeatureManifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
        assert!(loaded.contains("race"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            ModelArtifact::load(&missing),
            Err(PipelineError::FileNotFound(p)) if p == missing
        ));
        assert!(matches!(
            FeatureManifest::load(&missing),
            Err(PipelineError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_metadata_defaults() {
        let metadata = ModelMetadata::new(ModelType::GradientBoosting, "readmitted");
        assert_eq!(metadata.name, "readmission_gradient_boosting");
        assert_eq!(metadata.version, env!("CARGO_PKG_VERSION"));
        assert!(metadata.validation_auc.is_none());
    }
}
