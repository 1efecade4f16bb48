//! Preprocessing configuration

use super::{EncoderType, ImputeStrategy, ScalerType};
use serde::{Deserialize, Serialize};

/// What the encoder does with a category it never saw during fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnknownCategory {
    /// Encode as all zeros
    Ignore,
    /// Fail the transform
    Error,
}

/// Configuration for data preprocessing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Strategy for handling missing numeric values
    pub numeric_impute_strategy: ImputeStrategy,

    /// Strategy for handling missing categorical values
    pub categorical_impute_strategy: ImputeStrategy,

    /// Type of scaler to use for numeric features
    pub scaler_type: ScalerType,

    /// Type of encoder to use for categorical features
    pub encoder_type: EncoderType,

    /// Handling of categories unseen during fit
    pub unknown_category: UnknownCategory,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            numeric_impute_strategy: ImputeStrategy::Median,
            categorical_impute_strategy: ImputeStrategy::MostFrequent,
            scaler_type: ScalerType::Standard,
            encoder_type: EncoderType::OneHot,
            unknown_category: UnknownCategory::Ignore,
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set numeric impute strategy
    pub fn with_numeric_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.numeric_impute_strategy = strategy;
        self
    }

    /// Builder method to set categorical impute strategy
    pub fn with_categorical_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.categorical_impute_strategy = strategy;
        self
    }

    /// Builder method to set scaler type
    pub fn with_scaler(mut self, scaler_type: ScalerType) -> Self {
        self.scaler_type = scaler_type;
        self
    }

    /// Builder method to set encoder type
    pub fn with_encoder(mut self, encoder_type: EncoderType) -> Self {
        self.encoder_type = encoder_type;
        self
    }

    pub fn with_unknown_category(mut self, handling: UnknownCategory) -> Self {
        self.unknown_category = handling;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PreprocessingConfig::default();
        assert_eq!(config.numeric_impute_strategy, ImputeStrategy::Median);
        assert_eq!(config.categorical_impute_strategy, ImputeStrategy::MostFrequent);
        assert_eq!(config.scaler_type, ScalerType::Standard);
        assert_eq!(config.unknown_category, UnknownCategory::Ignore);
    }

    #[test]
    fn test_builder_pattern() {
        let config = PreprocessingConfig::new()
            .with_scaler(ScalerType::MinMax)
            .with_numeric_impute(ImputeStrategy::Mean)
            .with_unknown_category(UnknownCategory::Error);

        assert_eq!(config.scaler_type, ScalerType::MinMax);
        assert_eq!(config.numeric_impute_strategy, ImputeStrategy::Mean);
        assert_eq!(config.unknown_category, UnknownCategory::Error);
    }
}
