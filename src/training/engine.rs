//! Training engine: hold-out scoring, cross-validation, candidate selection
//! and the final refit.

use super::config::{ModelType, TrainingConfig};
use super::cross_validation::{train_test_split, CVResults, CVStrategy, CrossValidator};
use super::models::{roc_auc, ModelMetrics};
use super::pipeline::{take_rows, ClassifierPipeline};
use crate::analysis::AnalysisArtifact;
use crate::error::{PipelineError, Result};
use crate::preprocessing::{as_float_series, ColumnKind, PreprocessingConfig};
use ndarray::{Array1, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Fold scores of one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVScores {
    pub accuracy: CVResults,
    pub auc: CVResults,
}

/// How one candidate fared on the hold-out split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub model_type: ModelType,
    pub validation_auc: Option<f64>,
    pub validation_accuracy: Option<f64>,
    pub cv: Option<CVScores>,
    /// Set when the candidate failed to fit
    pub error: Option<String>,
}

impl CandidateScore {
    fn failed(model_type: ModelType, err: &PipelineError) -> Self {
        Self {
            model_type,
            validation_auc: None,
            validation_accuracy: None,
            cv: None,
            error: Some(err.to_string()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything a training run produces
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Final fitted pipeline
    pub pipeline: ClassifierPipeline,
    /// Non-target columns in table order
    pub manifest: Vec<String>,
    pub selected: ModelType,
    pub candidates: Vec<CandidateScore>,
    /// Hold-out metrics of the selected candidate
    pub validation_metrics: ModelMetrics,
    /// AUC of the final pipeline on every training row
    pub training_auc: Option<f64>,
    /// Target label -> row count
    pub class_counts: BTreeMap<i64, usize>,
    pub n_samples: usize,
    pub training_time_secs: f64,
}

impl TrainingOutcome {
    pub fn validation_auc(&self) -> Option<f64> {
        self.validation_metrics.auc_roc
    }

    pub fn selected_score(&self) -> Option<&CandidateScore> {
        self.candidates
            .iter()
            .find(|c| c.model_type == self.selected && c.succeeded())
    }

    /// Majority over minority class count
    pub fn imbalance_ratio(&self) -> Option<f64> {
        let max = self.class_counts.values().max().copied()?;
        let min = self.class_counts.values().min().copied()?;
        if min == 0 {
            return None;
        }
        Some(max as f64 / min as f64)
    }

    /// Text report summarizing the run
    pub fn summary(&self) -> String {
        let fmt_opt = |v: Option<f64>| v.map_or("n/a".to_string(), |v| format!("{:.4}", v));

        let mut report = String::new();
        report.push_str("=== Readmission Model Training Report ===\n\n");
        report.push_str(&format!("Selected Model: {}\n", self.selected));
        report.push_str(&format!("Samples:        {}\n", self.n_samples));
        report.push_str(&format!("Features:       {}\n", self.manifest.len()));
        report.push_str(&format!("Training Time:  {:.2}s\n\n", self.training_time_secs));

        report.push_str("--- Candidates ---\n");
        for c in &self.candidates {
            match &c.error {
                Some(err) => report.push_str(&format!("  {:<20} failed: {}\n", c.model_type.as_str(), err)),
                None => {
                    report.push_str(&format!(
                        "  {:<20} val AUC {}  val acc {}",
                        c.model_type.as_str(),
                        fmt_opt(c.validation_auc),
                        fmt_opt(c.validation_accuracy)
                    ));
                    if let Some(cv) = &c.cv {
                        report.push_str(&format!(
                            "  cv AUC {:.4} ± {:.4}",
                            cv.auc.mean_score, cv.auc.std_score
                        ));
                    }
                    report.push('\n');
                }
            }
        }

        report.push_str("\n--- Scores ---\n");
        report.push_str(&format!("Validation AUC: {}\n", fmt_opt(self.validation_auc())));
        report.push_str(&format!("Training AUC:   {}\n", fmt_opt(self.training_auc)));

        if let Some(importances) = self.pipeline.column_importances() {
            let mut pairs: Vec<(String, f64)> = importances.into_iter().collect();
            pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            report.push_str("\n--- Feature Importance ---\n");
            for (name, imp) in pairs.iter().take(15) {
                report.push_str(&format!("  {:<24} {:.4}\n", name, imp));
            }
        }

        report
    }
}

/// Trains the readmission classifier
#[derive(Debug, Clone, Default)]
pub struct TrainEngine {
    config: TrainingConfig,
    preprocessing: PreprocessingConfig,
}

impl TrainEngine {
    /// Create a new training engine
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            preprocessing: PreprocessingConfig::default(),
        }
    }

    pub fn with_preprocessing(mut self, preprocessing: PreprocessingConfig) -> Self {
        self.preprocessing = preprocessing;
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Run the full training procedure on `df`
    ///
    /// Column kinds come from `analysis` when it lists a column, otherwise
    /// from the column dtype.
    pub fn train(&self, df: &DataFrame, analysis: Option<&AnalysisArtifact>) -> Result<TrainingOutcome> {
        let start = Instant::now();
        self.config.validate()?;

        let target = self.config.target_column.as_str();
        let y = self.extract_target(df)?;
        let class_counts = count_classes(&y);
        if class_counts.len() < 2 {
            return Err(PipelineError::SchemaError(format!(
                "target '{}' has a single class",
                target
            )));
        }

        let features = df.drop(target)?;
        let manifest: Vec<String> = features
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        if manifest.is_empty() {
            return Err(PipelineError::SchemaError(
                "table has no feature columns".to_string(),
            ));
        }
        let (numeric, categorical) = self.column_split(&features, analysis);

        info!(
            rows = df.height(),
            features = manifest.len(),
            numeric = numeric.len(),
            categorical = categorical.len(),
            "Starting training"
        );

        let seed = self.config.random_state.unwrap_or(42);
        let (train_idx, val_idx) = train_test_split(&y, self.config.validation_split, seed)?;
        let split = HoldOut {
            x_train: take_rows(&features, &train_idx)?,
            y_train: y.select(Axis(0), &train_idx),
            x_val: take_rows(&features, &val_idx)?,
            y_val: y.select(Axis(0), &val_idx),
        };
        debug!(train = train_idx.len(), validation = val_idx.len(), "Hold-out split");

        let mut candidates: Vec<CandidateScore> = Vec::new();
        let mut fitted: Vec<(ModelType, ClassifierPipeline, ModelMetrics)> = Vec::new();

        let mut queue = self.config.model_type.candidates();
        let mut fallbacks = self.config.fallback_models.iter().filter(|m| **m != ModelType::Auto);

        loop {
            for model_type in queue.drain(..) {
                if candidates.iter().any(|c| c.model_type == model_type) {
                    continue;
                }
                match self.score_candidate(model_type, &split, &numeric, &categorical) {
                    Ok((pipeline, metrics)) => {
                        let cv = if self.config.cv_folds >= 2 {
                            match self.cross_validate(model_type, &features, &y, &numeric, &categorical) {
                                Ok(scores) => Some(scores),
                                Err(err) => {
                                    warn!(model = %model_type, error = %err, "Cross-validation failed");
                                    candidates.push(CandidateScore::failed(model_type, &err));
                                    continue;
                                }
                            }
                        } else {
                            None
                        };
                        info!(
                            model = %model_type,
                            val_auc = ?metrics.auc_roc,
                            cv_auc = ?cv.as_ref().map(|c| c.auc.mean_score),
                            "Scored candidate"
                        );
                        candidates.push(CandidateScore {
                            model_type,
                            validation_auc: metrics.auc_roc,
                            validation_accuracy: Some(metrics.accuracy),
                            cv,
                            error: None,
                        });
                        fitted.push((model_type, pipeline, metrics));
                    }
                    Err(err) => {
                        warn!(model = %model_type, error = %err, "Candidate failed to fit");
                        candidates.push(CandidateScore::failed(model_type, &err));
                    }
                }
            }

            if !fitted.is_empty() {
                break;
            }
            match fallbacks.next() {
                Some(next) => {
                    warn!(fallback = %next, "Falling back");
                    queue.push(*next);
                }
                None => {
                    let reasons: Vec<String> = candidates
                        .iter()
                        .filter_map(|c| c.error.as_ref().map(|e| format!("{}: {}", c.model_type, e)))
                        .collect();
                    return Err(PipelineError::TrainingError(format!(
                        "no model could be fitted ({})",
                        reasons.join("; ")
                    )));
                }
            }
        }

        let best = select_best(&fitted);
        let (selected, holdout_pipeline, mut validation_metrics) = fitted.swap_remove(best);
        info!(model = %selected, val_auc = ?validation_metrics.auc_roc, "Selected model");

        let pipeline = if self.config.refit_full {
            debug!(rows = features.height(), "Refitting on all rows");
            ClassifierPipeline::fit(
                selected,
                &self.config,
                &self.preprocessing,
                &features,
                &y,
                &numeric,
                &categorical,
            )?
        } else {
            holdout_pipeline
        };

        let training_auc = roc_auc(&y, &pipeline.predict_proba(&features)?);
        let training_time_secs = start.elapsed().as_secs_f64();
        validation_metrics.training_time_secs = training_time_secs;
        validation_metrics.n_features = pipeline.preprocessor().output_feature_names().len();

        info!(
            model = %selected,
            train_auc = ?training_auc,
            elapsed_secs = training_time_secs,
            "Training complete"
        );

        Ok(TrainingOutcome {
            pipeline,
            manifest,
            selected,
            candidates,
            validation_metrics,
            training_auc,
            class_counts,
            n_samples: df.height(),
            training_time_secs,
        })
    }

    /// Target column as 0/1 floats
    pub fn extract_target(&self, df: &DataFrame) -> Result<Array1<f64>> {
        binary_target(df, &self.config.target_column)
    }

    /// Numeric-branch and categorical-branch column names in table order
    fn column_split(
        &self,
        features: &DataFrame,
        analysis: Option<&AnalysisArtifact>,
    ) -> (Vec<String>, Vec<String>) {
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();
        for col in features.get_columns() {
            let name = col.name().as_str();
            let kind = analysis
                .and_then(|a| a.kind_of(name))
                .unwrap_or_else(|| ColumnKind::from_dtype(col.dtype()));
            if kind.is_numeric_branch() {
                numeric.push(name.to_string());
            } else {
                categorical.push(name.to_string());
            }
        }
        (numeric, categorical)
    }

    fn score_candidate(
        &self,
        model_type: ModelType,
        split: &HoldOut,
        numeric: &[String],
        categorical: &[String],
    ) -> Result<(ClassifierPipeline, ModelMetrics)> {
        let pipeline = ClassifierPipeline::fit(
            model_type,
            &self.config,
            &self.preprocessing,
            &split.x_train,
            &split.y_train,
            numeric,
            categorical,
        )?;
        let proba = pipeline.predict_proba(&split.x_val)?;
        let metrics = ModelMetrics::from_probabilities(&split.y_val, &proba);
        Ok((pipeline, metrics))
    }

    /// Stratified K-fold; preprocessing is refit inside every fold
    fn cross_validate(
        &self,
        model_type: ModelType,
        features: &DataFrame,
        y: &Array1<f64>,
        numeric: &[String],
        categorical: &[String],
    ) -> Result<CVScores> {
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: self.config.cv_folds,
            shuffle: true,
        })
        .with_random_state(self.config.random_state.unwrap_or(42));

        let mut accuracy = Vec::with_capacity(self.config.cv_folds);
        let mut auc = Vec::with_capacity(self.config.cv_folds);

        for fold in cv.split(y.len(), Some(y))? {
            let split = HoldOut {
                x_train: take_rows(features, &fold.train_indices)?,
                y_train: y.select(Axis(0), &fold.train_indices),
                x_val: take_rows(features, &fold.test_indices)?,
                y_val: y.select(Axis(0), &fold.test_indices),
            };
            let (_, metrics) = self.score_candidate(model_type, &split, numeric, categorical)?;
            debug!(model = %model_type, fold = fold.fold_idx, auc = ?metrics.auc_roc, "CV fold");

            accuracy.push(metrics.accuracy);
            if let Some(a) = metrics.auc_roc {
                auc.push(a);
            }
        }

        Ok(CVScores {
            accuracy: CVResults::from_scores(accuracy),
            auc: CVResults::from_scores(auc),
        })
    }
}

/// `target` as 0/1 floats; absent, null or non-binary targets are `SchemaError`
pub fn binary_target(df: &DataFrame, target: &str) -> Result<Array1<f64>> {
    let column = df
        .column(target)
        .map_err(|_| PipelineError::SchemaError(format!("target column '{}' not found", target)))?;

    let values = as_float_series(column.as_materialized_series())
        .map_err(|e| PipelineError::SchemaError(e.to_string()))?;
    let ca = values.f64()?;

    if ca.null_count() > 0 {
        return Err(PipelineError::SchemaError(format!(
            "target '{}' has {} missing values",
            target,
            ca.null_count()
        )));
    }

    let y: Vec<f64> = ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
    if let Some(bad) = y.iter().find(|v| **v != 0.0 && **v != 1.0) {
        return Err(PipelineError::SchemaError(format!(
            "target '{}' must be binary 0/1, found {}",
            target, bad
        )));
    }
    Ok(Array1::from_vec(y))
}

struct HoldOut {
    x_train: DataFrame,
    y_train: Array1<f64>,
    x_val: DataFrame,
    y_val: Array1<f64>,
}

fn count_classes(y: &Array1<f64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for v in y {
        *counts.entry(v.round() as i64).or_insert(0) += 1;
    }
    counts
}

/// Index of the highest validation AUC; the earlier candidate wins ties
fn select_best(fitted: &[(ModelType, ClassifierPipeline, ModelMetrics)]) -> usize {
    let mut best = 0;
    let mut best_auc = f64::NEG_INFINITY;
    for (i, (_, _, metrics)) in fitted.iter().enumerate() {
        let auc = metrics.auc_roc.unwrap_or(f64::NEG_INFINITY);
        if auc > best_auc {
            best = i;
            best_auc = auc;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_data(n: usize) -> DataFrame {
        let age: Vec<f64> = (0..n).map(|i| 40.0 + (i % 40) as f64).collect();
        let visits: Vec<i64> = (0..n).map(|i| ((i * 7) % 11) as i64).collect();
        let ward: Vec<&str> = (0..n)
            .map(|i| match i % 3 {
                0 => "cardio",
                1 => "ortho",
                _ => "neuro",
            })
            .collect();
        let readmitted: Vec<i64> = (0..n).map(|i| ((i % 40) >= 20) as i64).collect();
        df!(
            "age" => age,
            "num_visits" => visits,
            "ward" => ward,
            "readmitted" => readmitted
        )
        .unwrap()
    }

    fn fast_config() -> TrainingConfig {
        TrainingConfig::default()
            .with_n_estimators(20)
            .with_max_depth(3)
            .with_forest_estimators(10)
    }

    #[test]
    fn test_train_default_model() {
        let df = create_test_data(200);
        let outcome = TrainEngine::new(fast_config()).train(&df, None).unwrap();

        assert_eq!(outcome.selected, ModelType::GradientBoosting);
        assert_eq!(outcome.manifest, vec!["age", "num_visits", "ward"]);
        assert_eq!(outcome.n_samples, 200);
        assert!(outcome.validation_auc().unwrap() > 0.9);
        assert!(outcome.training_auc.unwrap() > 0.9);
        assert_eq!(outcome.class_counts[&0] + outcome.class_counts[&1], 200);
    }

    #[test]
    fn test_auto_scores_every_candidate() {
        let df = create_test_data(200);
        let config = fast_config().with_model(ModelType::Auto).with_cv(3);
        let outcome = TrainEngine::new(config).train(&df, None).unwrap();

        assert_eq!(outcome.candidates.len(), 3);
        assert!(outcome.candidates.iter().all(|c| c.cv.is_some()));
        let best = outcome
            .candidates
            .iter()
            .filter_map(|c| c.validation_auc)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(outcome.validation_auc(), Some(best));
        assert!(outcome.summary().contains("Selected Model"));
    }

    #[test]
    fn test_missing_target_is_schema_error() {
        let df = create_test_data(50).drop("readmitted").unwrap();
        let result = TrainEngine::new(fast_config()).train(&df, None);
        assert!(matches!(result, Err(PipelineError::SchemaError(_))));
    }

    #[test]
    fn test_non_binary_target_is_schema_error() {
        let mut df = create_test_data(50);
        let bad: Vec<i64> = (0..50).map(|i| i % 3).collect();
        df.with_column(Series::new("readmitted".into(), bad)).unwrap();
        let result = TrainEngine::new(fast_config()).train(&df, None);
        assert!(matches!(result, Err(PipelineError::SchemaError(_))));
    }

    #[test]
    fn test_null_target_is_schema_error() {
        let df = df!(
            "age" => &[1.0, 2.0, 3.0, 4.0],
            "readmitted" => &[Some(0i64), None, Some(1), Some(0)]
        )
        .unwrap();
        let result = TrainEngine::new(fast_config()).train(&df, None);
        assert!(matches!(result, Err(PipelineError::SchemaError(_))));
    }

    #[test]
    fn test_select_best_prefers_earlier_on_tie() {
        let df = create_test_data(60);
        let engine = TrainEngine::new(fast_config().with_model(ModelType::LogisticRegression));
        let outcome = engine.train(&df, None).unwrap();

        let metrics = outcome.validation_metrics.clone();
        let fitted = vec![
            (ModelType::RandomForest, outcome.pipeline.clone(), metrics.clone()),
            (ModelType::LogisticRegression, outcome.pipeline.clone(), metrics),
        ];
        assert_eq!(select_best(&fitted), 0);
    }

    #[test]
    fn test_failed_cross_validation_marks_candidate_failed() {
        // four rows cannot be cut into five folds
        let df = df!(
            "age" => &[50.0, 61.0, 47.0, 70.0],
            "readmitted" => &[0i64, 1, 0, 1]
        )
        .unwrap();
        let result = TrainEngine::new(fast_config().with_cv(5)).train(&df, None);
        assert!(matches!(result, Err(PipelineError::TrainingError(_))));
    }

    #[test]
    fn test_without_refit_keeps_holdout_model() {
        let df = create_test_data(100);
        let mut config = fast_config();
        config.refit_full = false;
        let outcome = TrainEngine::new(config).train(&df, None).unwrap();
        assert!(outcome.training_auc.is_some());
    }
}
