//! Column-wise feature pipeline

use super::{
    as_float_series, as_string_series, config::PreprocessingConfig, encoder::Encoder,
    imputer::Imputer, scaler::Scaler,
};
use crate::error::{PipelineError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Numeric branch: impute then scale. Categorical branch: impute then encode.
///
/// Output columns are the numeric features in input order followed by the
/// encoded categorical features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturePipeline {
    config: PreprocessingConfig,
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    numeric_imputer: Option<Imputer>,
    categorical_imputer: Option<Imputer>,
    scaler: Option<Scaler>,
    encoder: Option<Encoder>,
    feature_names: Vec<String>,
    is_fitted: bool,
    /// Seconds spent in the last fit call
    fit_time: Option<f64>,
}

impl Default for FeaturePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl FeaturePipeline {
    /// Create a new pipeline with default configuration
    pub fn new() -> Self {
        Self::with_config(PreprocessingConfig::default())
    }

    /// Create a new pipeline with custom configuration
    pub fn with_config(config: PreprocessingConfig) -> Self {
        Self {
            config,
            numeric_columns: Vec::new(),
            categorical_columns: Vec::new(),
            numeric_imputer: None,
            categorical_imputer: None,
            scaler: None,
            encoder: None,
            feature_names: Vec::new(),
            is_fitted: false,
            fit_time: None,
        }
    }

    /// Select the feature columns and give them a uniform dtype per branch
    fn prepare(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut columns: Vec<Column> =
            Vec::with_capacity(self.numeric_columns.len() + self.categorical_columns.len());

        for name in &self.numeric_columns {
            let series = Self::column(df, name)?;
            columns.push(as_float_series(series)?.into());
        }
        for name in &self.categorical_columns {
            let series = Self::column(df, name)?;
            columns.push(as_string_series(series)?.into());
        }

        if columns.is_empty() {
            return Ok(DataFrame::empty());
        }
        Ok(DataFrame::new(columns)?)
    }

    fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
        df.column(name)
            .map(|c| c.as_materialized_series())
            .map_err(|_| PipelineError::MissingColumn(name.to_string()))
    }

    /// Fit on `df` using the given column split
    pub fn fit(
        &mut self,
        df: &DataFrame,
        numeric: &[String],
        categorical: &[String],
    ) -> Result<&mut Self> {
        let start = Instant::now();

        if numeric.is_empty() && categorical.is_empty() {
            return Err(PipelineError::PreprocessingError(
                "no feature columns to fit".to_string(),
            ));
        }
        if df.height() == 0 {
            return Err(PipelineError::PreprocessingError(
                "cannot fit on an empty table".to_string(),
            ));
        }

        self.numeric_columns = numeric.to_vec();
        self.categorical_columns = categorical.to_vec();
        self.numeric_imputer = None;
        self.categorical_imputer = None;
        self.scaler = None;
        self.encoder = None;

        let prepared = self.prepare(df)?;

        if !self.numeric_columns.is_empty() {
            let cols: Vec<&str> = self.numeric_columns.iter().map(|s| s.as_str()).collect();

            let mut imputer = Imputer::new(self.config.numeric_impute_strategy.clone());
            let imputed = imputer.fit_transform(&prepared, &cols)?;

            let mut scaler = Scaler::new(self.config.scaler_type);
            scaler.fit(&imputed, &cols)?;

            self.numeric_imputer = Some(imputer);
            self.scaler = Some(scaler);
        }

        if !self.categorical_columns.is_empty() {
            let cols: Vec<&str> = self.categorical_columns.iter().map(|s| s.as_str()).collect();

            let mut imputer = Imputer::new(self.config.categorical_impute_strategy.clone());
            let imputed = imputer.fit_transform(&prepared, &cols)?;

            let mut encoder =
                Encoder::new(self.config.encoder_type).with_unknown(self.config.unknown_category);
            encoder.fit(&imputed, &cols)?;

            self.categorical_imputer = Some(imputer);
            self.encoder = Some(encoder);
        }

        self.feature_names = self.numeric_columns.clone();
        if let Some(ref encoder) = self.encoder {
            self.feature_names.extend(encoder.feature_names());
        }

        self.is_fitted = true;
        self.fit_time = Some(start.elapsed().as_secs_f64());
        debug!(
            numeric = self.numeric_columns.len(),
            categorical = self.categorical_columns.len(),
            outputs = self.feature_names.len(),
            "Fitted feature pipeline"
        );
        Ok(self)
    }

    /// Transform `df` into the model matrix
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut prepared = self.prepare(df)?;
        let mut blocks: Vec<DataFrame> = Vec::with_capacity(2);

        if let Some(ref imputer) = self.numeric_imputer {
            prepared = imputer.transform(&prepared)?;
        }
        if let Some(ref imputer) = self.categorical_imputer {
            prepared = imputer.transform(&prepared)?;
        }
        if let Some(ref scaler) = self.scaler {
            let scaled = scaler.transform(&prepared)?;
            blocks.push(scaled.select(self.numeric_columns.iter().map(|s| s.as_str()))?);
        }
        if let Some(ref encoder) = self.encoder {
            blocks.push(encoder.transform(&prepared)?);
        }

        let n_rows = df.height();
        let mut x = Array2::<f64>::zeros((n_rows, self.feature_names.len()));
        let mut j = 0;
        for block in &blocks {
            for column in block.get_columns() {
                let ca = column.as_materialized_series().f64()?;
                for (i, v) in ca.into_iter().enumerate() {
                    x[[i, j]] = v.unwrap_or(0.0);
                }
                j += 1;
            }
        }

        if j != self.feature_names.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} output features", self.feature_names.len()),
                actual: format!("{} columns", j),
            });
        }
        Ok(x)
    }

    /// Fit and transform in one step
    pub fn fit_transform(
        &mut self,
        df: &DataFrame,
        numeric: &[String],
        categorical: &[String],
    ) -> Result<Array2<f64>> {
        self.fit(df, numeric, categorical)?;
        self.transform(df)
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical_columns
    }

    /// Raw input columns consumed by the pipeline
    pub fn input_columns(&self) -> Vec<&str> {
        self.numeric_columns
            .iter()
            .chain(self.categorical_columns.iter())
            .map(|s| s.as_str())
            .collect()
    }

    /// Names of the matrix columns produced by `transform`
    pub fn output_feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Raw input column each output feature derives from
    pub fn source_column(&self, output_idx: usize) -> Option<&str> {
        let n_numeric = self.numeric_columns.len();
        if output_idx < n_numeric {
            return Some(self.numeric_columns[output_idx].as_str());
        }
        let encoder = self.encoder.as_ref()?;
        let mut offset = n_numeric;
        for col in &self.categorical_columns {
            let width = match self.config.encoder_type {
                super::EncoderType::OneHot => encoder.categories_for(col).len(),
                super::EncoderType::Ordinal => 1,
            };
            if output_idx < offset + width {
                return Some(col.as_str());
            }
            offset += width;
        }
        None
    }

    pub fn fit_time(&self) -> Option<f64> {
        self.fit_time
    }
}
