//! Training configuration

use super::gradient_boosting::GradientBoostingConfig;
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Type of model to train
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Gradient boosted trees on log-loss
    GradientBoosting,
    /// L2-regularized logistic regression
    LogisticRegression,
    /// Bagged Gini trees
    RandomForest,
    /// Score every candidate and keep the best
    Auto,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::GradientBoosting => "gradient_boosting",
            ModelType::LogisticRegression => "logistic_regression",
            ModelType::RandomForest => "random_forest",
            ModelType::Auto => "auto",
        }
    }

    /// Concrete models scored for this choice, in preference order
    pub fn candidates(&self) -> Vec<ModelType> {
        match self {
            ModelType::Auto => vec![
                ModelType::GradientBoosting,
                ModelType::LogisticRegression,
                ModelType::RandomForest,
            ],
            other => vec![*other],
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "gradient_boosting" | "gb" | "xgboost" => Ok(ModelType::GradientBoosting),
            "logistic_regression" | "logistic" | "lr" => Ok(ModelType::LogisticRegression),
            "random_forest" | "rf" => Ok(ModelType::RandomForest),
            "auto" => Ok(ModelType::Auto),
            _ => Err(PipelineError::InvalidParameter {
                name: "model".to_string(),
                value: s.to_string(),
                reason: "expected gradient_boosting, logistic_regression, random_forest or auto"
                    .to_string(),
            }),
        }
    }
}

/// Configuration for model training
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Target column name
    pub target_column: String,

    /// Model type to train
    pub model_type: ModelType,

    /// Models tried in order when the chosen one fails to fit
    pub fallback_models: Vec<ModelType>,

    /// Hold-out fraction for validation AUC
    pub validation_split: f64,

    /// Number of cross-validation folds (0 = no CV)
    pub cv_folds: usize,

    /// Random seed for reproducibility
    pub random_state: Option<u64>,

    /// Refit the selected model on every row after validation
    pub refit_full: bool,

    /// Gradient boosting parameters
    pub gradient_boosting: GradientBoostingConfig,

    /// Number of trees in the random forest
    pub forest_estimators: usize,

    /// Maximum depth of random forest trees
    pub forest_max_depth: Option<usize>,

    /// L2 penalty for logistic regression
    pub logistic_alpha: f64,

    /// Gradient descent iterations for logistic regression
    pub logistic_max_iter: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            target_column: "readmitted".to_string(),
            model_type: ModelType::GradientBoosting,
            fallback_models: vec![ModelType::LogisticRegression, ModelType::RandomForest],
            validation_split: 0.2,
            cv_folds: 0,
            random_state: Some(42),
            refit_full: true,
            gradient_boosting: GradientBoostingConfig::default(),
            forest_estimators: 200,
            forest_max_depth: Some(12),
            logistic_alpha: 0.01,
            logistic_max_iter: 1000,
        }
    }
}

impl TrainingConfig {
    /// Create a new configuration
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target_column: target.into(),
            ..Default::default()
        }
    }

    /// Builder method to set model type
    pub fn with_model(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }

    /// Builder method to set CV folds
    pub fn with_cv(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Builder method to set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self.gradient_boosting.random_state = Some(seed);
        self
    }

    /// Builder method to set the boosting rounds
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.gradient_boosting.n_estimators = n;
        self
    }

    /// Builder method to set the boosting tree depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.gradient_boosting.max_depth = depth;
        self
    }

    pub fn with_forest_estimators(mut self, n: usize) -> Self {
        self.forest_estimators = n;
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: Vec<ModelType>) -> Self {
        self.fallback_models = fallbacks;
        self
    }

    pub fn with_validation_split(mut self, fraction: f64) -> Self {
        self.validation_split = fraction;
        self
    }

    /// Check ranges before training starts
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(self.validation_split > 0.0 && self.validation_split < 1.0) {
            return Err(PipelineError::InvalidParameter {
                name: "validation_split".to_string(),
                value: self.validation_split.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }
        if self.cv_folds == 1 {
            return Err(PipelineError::InvalidParameter {
                name: "cv_folds".to_string(),
                value: "1".to_string(),
                reason: "use 0 to disable or at least 2".to_string(),
            });
        }
        self.gradient_boosting.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.target_column, "readmitted");
        assert_eq!(config.validation_split, 0.2);
        assert_eq!(config.random_state, Some(42));
        assert_eq!(config.gradient_boosting.n_estimators, 400);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_model_type_parse() {
        assert_eq!("random_forest".parse::<ModelType>().unwrap(), ModelType::RandomForest);
        assert_eq!("Gradient-Boosting".parse::<ModelType>().unwrap(), ModelType::GradientBoosting);
        assert!("svm".parse::<ModelType>().is_err());
    }

    #[test]
    fn test_auto_candidates() {
        assert_eq!(ModelType::Auto.candidates().len(), 3);
        assert_eq!(ModelType::RandomForest.candidates(), vec![ModelType::RandomForest]);
    }

    #[test]
    fn test_validate_rejects_bad_split() {
        let config = TrainingConfig::default().with_validation_split(1.0);
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidParameter { .. })
        ));
        assert!(TrainingConfig::default().with_cv(1).validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"model_type": "auto", "cv_folds": 5}"#).unwrap();
        assert_eq!(config.model_type, ModelType::Auto);
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.target_column, "readmitted");
    }
}
