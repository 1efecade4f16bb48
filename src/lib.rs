//! readmit-automl - hospital readmission classification pipeline
//!
//! Three deterministic stages over tabular patient data:
//! - Analysis of the train split into a JSON artifact
//! - Training of a binary classifier (preprocessing + model) with candidate
//!   selection by validation AUC
//! - Evaluation of the persisted model on the test split
//!
//! # Modules
//!
//! ## Data
//! - [`utils`] - Table loading (CSV, Parquet, JSON, Arrow, dataset stores)
//! - [`analysis`] - Dataset analysis artifact
//!
//! ## Modeling
//! - [`preprocessing`] - Imputation, scaling, one-hot encoding
//! - [`training`] - Classifiers, cross-validation, training engine
//! - [`export`] - Model and feature manifest persistence
//! - [`evaluation`] - Test split scoring
//!
//! ## Orchestration
//! - [`config`] - Pipeline configuration
//! - [`dispatch`] - Free-text request routing
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Data
pub mod utils;
pub mod analysis;

// Modeling
pub mod preprocessing;
pub mod training;
pub mod export;
pub mod evaluation;

// Orchestration
pub mod dispatch;
pub mod cli;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PipelineError, Result};

    // Configuration
    pub use crate::config::{ArtifactPaths, PipelineConfig};

    // Data
    pub use crate::utils::{load_table, load_test_split, load_train_split, DatasetStore, Split};
    pub use crate::analysis::{read_artifact, write_artifact, AnalysisArtifact, AnalysisProducer};

    // Preprocessing
    pub use crate::preprocessing::{ColumnKind, FeaturePipeline, PreprocessingConfig};

    // Training
    pub use crate::training::{
        ClassifierPipeline, ModelMetrics, ModelType, TrainEngine, TrainingConfig, TrainingOutcome,
    };

    // Export
    pub use crate::export::{FeatureManifest, ModelArtifact, ModelMetadata};

    // Evaluation
    pub use crate::evaluation::{evaluate_model, EvaluationReport, Evaluator};

    // Dispatch
    pub use crate::dispatch::{classify, Delegation, DispatchTable, PipelineContext, TaskKind};
}
