//! Model training module
//!
//! Provides the readmission classifiers and the procedure that picks one:
//! - Gradient boosting on log-loss (preferred model)
//! - Logistic regression
//! - Random forest
//! - Stratified hold-out and K-fold cross-validation
//! - Candidate selection by validation AUC with a fallback chain

mod config;
mod engine;
mod models;
mod pipeline;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod random_forest;

pub use config::{ModelType, TrainingConfig};
pub use cross_validation::{train_test_split, CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use engine::{binary_target, CVScores, CandidateScore, TrainEngine, TrainingOutcome};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use linear_models::LogisticRegression;
pub use models::{
    roc_auc, ClassScores, ClassificationReport, Classifier, ConfusionMatrix, ModelMetrics,
    CLASS_NAMES, DECISION_THRESHOLD,
};
pub use pipeline::{take_rows, ClassifierPipeline, TrainedModel};
pub use random_forest::{MaxFeatures, RandomForest};
