//! Preprocessing + estimator bundle

use super::config::{ModelType, TrainingConfig};
use super::gradient_boosting::GradientBoostingClassifier;
use super::linear_models::LogisticRegression;
use super::models::{Classifier, DECISION_THRESHOLD};
use super::random_forest::{MaxFeatures, RandomForest};
use crate::error::{PipelineError, Result};
use crate::preprocessing::{FeaturePipeline, PreprocessingConfig};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
pub enum TrainedModel {
    GradientBoosting(GradientBoostingClassifier),
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
}

impl TrainedModel {
    /// Unfitted estimator for `model_type`, configured from `config`
    pub fn build(model_type: ModelType, config: &TrainingConfig) -> Result<Self> {
        let model = match model_type {
            ModelType::GradientBoosting => {
                let mut gb = config.gradient_boosting.clone();
                if gb.random_state.is_none() {
                    gb.random_state = config.random_state;
                }
                TrainedModel::GradientBoosting(GradientBoostingClassifier::new(gb))
            }
            ModelType::LogisticRegression => TrainedModel::LogisticRegression(
                LogisticRegression::new()
                    .with_alpha(config.logistic_alpha)
                    .with_max_iter(config.logistic_max_iter),
            ),
            ModelType::RandomForest => {
                let mut rf = RandomForest::new(config.forest_estimators)
                    .with_max_features(MaxFeatures::Sqrt)
                    .with_random_state(config.random_state.unwrap_or(42));
                if let Some(depth) = config.forest_max_depth {
                    rf = rf.with_max_depth(depth);
                }
                TrainedModel::RandomForest(rf)
            }
            ModelType::Auto => {
                return Err(PipelineError::InvalidParameter {
                    name: "model".to_string(),
                    value: "auto".to_string(),
                    reason: "auto selects among concrete models and cannot be built".to_string(),
                })
            }
        };
        Ok(model)
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            TrainedModel::GradientBoosting(_) => ModelType::GradientBoosting,
            TrainedModel::LogisticRegression(_) => ModelType::LogisticRegression,
            TrainedModel::RandomForest(_) => ModelType::RandomForest,
        }
    }

    pub fn as_classifier(&self) -> &dyn Classifier {
        match self {
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::RandomForest(m) => m,
        }
    }

    pub fn as_classifier_mut(&mut self) -> &mut dyn Classifier {
        match self {
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::LogisticRegression(m) => m,
            TrainedModel::RandomForest(m) => m,
        }
    }
}

/// Fitted feature pipeline followed by a binary classifier
///
/// Takes raw tables: the preprocessor selects its own input columns by name,
/// so column order and extra columns do not matter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierPipeline {
    preprocessor: FeaturePipeline,
    model: TrainedModel,
}

impl ClassifierPipeline {
    pub fn new(preprocessor: FeaturePipeline, model: TrainedModel) -> Self {
        Self {
            preprocessor,
            model,
        }
    }

    /// Fit preprocessing and the estimator on `df` / `y`
    pub fn fit(
        model_type: ModelType,
        training: &TrainingConfig,
        preprocessing: &PreprocessingConfig,
        df: &DataFrame,
        y: &Array1<f64>,
        numeric: &[String],
        categorical: &[String],
    ) -> Result<Self> {
        if df.height() != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} targets", df.height()),
                actual: format!("{} targets", y.len()),
            });
        }

        let mut preprocessor = FeaturePipeline::with_config(preprocessing.clone());
        let x = preprocessor.fit_transform(df, numeric, categorical)?;

        let mut model = TrainedModel::build(model_type, training)?;
        model.as_classifier_mut().fit(&x, y)?;

        Ok(Self::new(preprocessor, model))
    }

    /// Positive-class probabilities for every row of `df`
    pub fn predict_proba(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let x = self.preprocessor.transform(df)?;
        self.model.as_classifier().predict_proba(&x)
    }

    /// Hard labels at the 0.5 threshold
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        Ok(self
            .predict_proba(df)?
            .mapv(|p| if p >= DECISION_THRESHOLD { 1.0 } else { 0.0 }))
    }

    pub fn model_type(&self) -> ModelType {
        self.model.model_type()
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn preprocessor(&self) -> &FeaturePipeline {
        &self.preprocessor
    }

    /// Importances keyed by model-matrix column name
    pub fn feature_importances(&self) -> Option<Vec<(String, f64)>> {
        let importances = self.model.as_classifier().feature_importances()?;
        Some(
            self.preprocessor
                .output_feature_names()
                .iter()
                .cloned()
                .zip(importances.iter().copied())
                .collect(),
        )
    }

    /// Importances summed back onto the raw input columns
    pub fn column_importances(&self) -> Option<BTreeMap<String, f64>> {
        let importances = self.model.as_classifier().feature_importances()?;
        let mut by_column: BTreeMap<String, f64> = self
            .preprocessor
            .input_columns()
            .into_iter()
            .map(|c| (c.to_string(), 0.0))
            .collect();

        for (idx, weight) in importances.iter().enumerate() {
            if let Some(source) = self.preprocessor.source_column(idx) {
                *by_column.entry(source.to_string()).or_insert(0.0) += weight;
            }
        }
        Some(by_column)
    }
}

/// Rows of `df` at `indices`, in that order
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> (DataFrame, Array1<f64>) {
        let n = 60;
        let dose: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let ward: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "a" } else { "b" }).collect();
        let df = df!("dose" => dose, "ward" => ward).unwrap();
        let y = Array1::from_shape_fn(n, |i| if i >= 30 { 1.0 } else { 0.0 });
        (df, y)
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_rejects_auto() {
        let config = TrainingConfig::default();
        assert!(TrainedModel::build(ModelType::Auto, &config).is_err());
        let model = TrainedModel::build(ModelType::RandomForest, &config).unwrap();
        assert_eq!(model.model_type(), ModelType::RandomForest);
    }

    #[test]
    fn test_fit_and_predict() {
        let (df, y) = frame();
        let pipeline = ClassifierPipeline::fit(
            ModelType::LogisticRegression,
            &TrainingConfig::default(),
            &PreprocessingConfig::default(),
            &df,
            &y,
            &names(&["dose"]),
            &names(&["ward"]),
        )
        .unwrap();

        let labels = pipeline.predict(&df).unwrap();
        assert_eq!(labels.len(), 60);
        assert_eq!(labels[0], 0.0);
        assert_eq!(labels[59], 1.0);
        assert_eq!(pipeline.model_type(), ModelType::LogisticRegression);
    }

    #[test]
    fn test_column_importances_cover_inputs() {
        let (df, y) = frame();
        let pipeline = ClassifierPipeline::fit(
            ModelType::LogisticRegression,
            &TrainingConfig::default(),
            &PreprocessingConfig::default(),
            &df,
            &y,
            &names(&["dose"]),
            &names(&["ward"]),
        )
        .unwrap();

        let by_column = pipeline.column_importances().unwrap();
        assert_eq!(by_column.len(), 2);
        assert!((by_column.values().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(by_column["dose"] > by_column["ward"]);

        let by_feature = pipeline.feature_importances().unwrap();
        assert_eq!(by_feature.len(), 3);
    }

    #[test]
    fn test_serde_round_trip_keeps_predictions() {
        let (df, y) = frame();
        let pipeline = ClassifierPipeline::fit(
            ModelType::LogisticRegression,
            &TrainingConfig::default(),
            &PreprocessingConfig::default(),
            &df,
            &y,
            &names(&["dose"]),
            &names(&["ward"]),
        )
        .unwrap();

        let json = serde_json::to_string(&pipeline).unwrap();
        let restored: ClassifierPipeline = serde_json::from_str(&json).unwrap();
        assert_eq!(
            pipeline.predict_proba(&df).unwrap(),
            restored.predict_proba(&df).unwrap()
        );
    }

    #[test]
    fn test_take_rows() {
        let (df, _) = frame();
        let subset = take_rows(&df, &[5, 1]).unwrap();
        assert_eq!(subset.height(), 2);
        let dose = subset.column("dose").unwrap().f64().unwrap();
        assert_eq!(dose.get(0), Some(5.0));
        assert_eq!(dose.get(1), Some(1.0));
    }
}
