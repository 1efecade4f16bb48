//! Dataset analysis
//!
//! Descriptive statistics for the train split, persisted as a fixed-schema
//! JSON artifact that the trainer and the modeling workflow read back.

mod producer;

pub use producer::{pearson, AnalysisProducer};

use crate::error::Result;
use crate::export::{load_json, save_json};
use crate::preprocessing::ColumnKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default artifact location
pub const DEFAULT_ANALYSIS_PATH: &str = "analysis_results/dataset_analysis.json";

/// One column of the analyzed table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub name: String,
    pub dtype: ColumnKind,
    /// Missing percentage in [0, 100]
    pub pct_missing: f64,
}

/// Where the analyzed splits live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetPaths {
    pub train: PathBuf,
    pub test: Option<PathBuf>,
    pub base_path: PathBuf,
}

impl DatasetPaths {
    /// `base_path` is the train path itself for a dataset-store directory,
    /// otherwise its parent directory
    pub fn new(train: impl Into<PathBuf>, test: Option<PathBuf>) -> Self {
        let train = train.into();
        let base_path = if train.is_dir() {
            train.clone()
        } else {
            train
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        };
        Self {
            train,
            test,
            base_path,
        }
    }
}

/// The analysis artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisArtifact {
    pub num_samples: usize,
    /// Every column in table order, target included
    pub features: Vec<FeatureSummary>,
    /// Target label -> count; nulls under "null"
    pub class_distribution: BTreeMap<String, usize>,
    /// Pearson r over numeric and boolean columns; `None` when undefined
    pub correlations: BTreeMap<String, BTreeMap<String, Option<f64>>>,
    pub dataset_paths: DatasetPaths,
}

impl AnalysisArtifact {
    /// Recorded kind of `column`, if the artifact lists it
    pub fn kind_of(&self, column: &str) -> Option<ColumnKind> {
        self.features
            .iter()
            .find(|f| f.name == column)
            .map(|f| f.dtype)
    }

    pub fn feature(&self, column: &str) -> Option<&FeatureSummary> {
        self.features.iter().find(|f| f.name == column)
    }

    /// Majority over minority class count, ignoring nulls
    pub fn imbalance_ratio(&self) -> Option<f64> {
        let counts: Vec<usize> = self
            .class_distribution
            .iter()
            .filter(|(label, _)| label.as_str() != "null")
            .map(|(_, c)| *c)
            .collect();
        let max = counts.iter().max().copied()?;
        let min = counts.iter().min().copied()?;
        if min == 0 {
            return None;
        }
        Some(max as f64 / min as f64)
    }
}

/// Write the artifact, creating its directory; overwrites any previous file
pub fn write_artifact(artifact: &AnalysisArtifact, path: impl AsRef<Path>) -> Result<()> {
    save_json(artifact, path)
}

/// Read an artifact; a missing file is `FileNotFound`
pub fn read_artifact(path: impl AsRef<Path>) -> Result<AnalysisArtifact> {
    load_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use tempfile::tempdir;

    fn artifact() -> AnalysisArtifact {
        let mut class_distribution = BTreeMap::new();
        class_distribution.insert("0".to_string(), 60);
        class_distribution.insert("1".to_string(), 30);
        AnalysisArtifact {
            num_samples: 90,
            features: vec![
                FeatureSummary {
                    name: "age".to_string(),
                    dtype: ColumnKind::Numeric,
                    pct_missing: 0.0,
                },
                FeatureSummary {
                    name: "race".to_string(),
                    dtype: ColumnKind::Categorical,
                    pct_missing: 12.5,
                },
            ],
            class_distribution,
            correlations: BTreeMap::new(),
            dataset_paths: DatasetPaths {
                train: PathBuf::from("data/train.csv"),
                test: None,
                base_path: PathBuf::from("data"),
            },
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("analysis_results/dataset_analysis.json");
        write_artifact(&artifact(), &path).unwrap();
        assert_eq!(read_artifact(&path).unwrap(), artifact());

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["features"][1]["dtype"], "categorical");
        assert_eq!(raw["class_distribution"]["1"], 30);
    }

    #[test]
    fn test_read_missing_artifact() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            read_artifact(dir.path().join("nope.json")),
            Err(PipelineError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_kind_lookup_and_imbalance() {
        let a = artifact();
        assert_eq!(a.kind_of("race"), Some(ColumnKind::Categorical));
        assert_eq!(a.kind_of("missing"), None);
        assert_eq!(a.imbalance_ratio(), Some(2.0));
    }

    #[test]
    fn test_dataset_paths_base_for_file() {
        let paths = DatasetPaths::new("data/train.csv", None);
        assert_eq!(paths.base_path, PathBuf::from("data"));
    }
}
