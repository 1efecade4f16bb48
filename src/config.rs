//! Pipeline-wide configuration
//!
//! Artifact paths default from environment variables; everything can be
//! overridden by a JSON file passed with `--config`.

use crate::analysis::DEFAULT_ANALYSIS_PATH;
use crate::error::{PipelineError, Result};
use crate::export::manifest_path_for;
use crate::preprocessing::PreprocessingConfig;
use crate::training::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL_PATH: &str = "models/readmission_model.json";
pub const DEFAULT_REPORT_PATH: &str = "analysis_results/modeling_report.json";

/// Where artifacts are read and written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPaths {
    pub analysis: PathBuf,
    pub model: PathBuf,
    /// Defaults to `<model stem>.features.json` beside the model
    pub manifest: Option<PathBuf>,
    pub report: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            analysis: std::env::var("READMIT_ANALYSIS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_ANALYSIS_PATH)),
            model: std::env::var("READMIT_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_PATH)),
            manifest: None,
            report: std::env::var("READMIT_REPORT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_REPORT_PATH)),
        }
    }
}

impl ArtifactPaths {
    /// Every artifact under `dir`, with the default file names
    pub fn under(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            analysis: dir.join("dataset_analysis.json"),
            model: dir.join("readmission_model.json"),
            manifest: None,
            report: dir.join("modeling_report.json"),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(|| manifest_path_for(&self.model))
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Binary target column
    pub target_column: String,
    pub paths: ArtifactPaths,
    pub preprocessing: PreprocessingConfig,
    pub training: TrainingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_column: "readmitted".to_string(),
            paths: ArtifactPaths::default(),
            preprocessing: PreprocessingConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.sync_target();
        config.training.validate()?;
        Ok(config)
    }

    pub fn with_paths(mut self, paths: ArtifactPaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_column = target.into();
        self.sync_target();
        self
    }

    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self.sync_target();
        self
    }

    /// The top-level target name wins over the one inside `training`
    fn sync_target(&mut self) {
        self.training.target_column = self.target_column.clone();
    }
}
