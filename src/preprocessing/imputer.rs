//! Missing value imputation strategies

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Fill for a categorical column that has no observed values at all
const EMPTY_CATEGORY_FILL: &str = "missing";

/// Strategy for imputing missing values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with mean (numeric only)
    Mean,
    /// Replace with median (numeric only)
    Median,
    /// Replace with mode / most frequent value
    MostFrequent,
    /// Replace with a constant value
    Constant(f64),
    /// Replace with a constant string (categorical)
    ConstantString(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum ImputeValue {
    Numeric(f64),
    String(String),
}

/// Imputer for handling missing values.
///
/// Numeric columns must already be `Float64` and categorical columns `String`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    fill_values: HashMap<String, ImputeValue>,
    is_fitted: bool,
}

impl Imputer {
    /// Create a new imputer with the specified strategy
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            fill_values: HashMap::new(),
            is_fitted: false,
        }
    }

    pub fn strategy(&self) -> &ImputeStrategy {
        &self.strategy
    }

    /// Fit the imputer to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| PipelineError::MissingColumn(col_name.to_string()))?;

            let fill_value = self.compute_fill_value(column.as_materialized_series())?;
            self.fill_values.insert(col_name.to_string(), fill_value);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data by imputing missing values
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut result = df.clone();
        for (col_name, fill_value) in &self.fill_values {
            let column = df
                .column(col_name)
                .map_err(|_| PipelineError::MissingColumn(col_name.clone()))?;
            let filled = Self::fill_series(column.as_materialized_series(), fill_value)?;
            result.with_column(filled)?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Fill value learned for `column`, rendered as text
    pub fn fill_value(&self, column: &str) -> Option<String> {
        self.fill_values.get(column).map(|v| match v {
            ImputeValue::Numeric(x) => x.to_string(),
            ImputeValue::String(s) => s.clone(),
        })
    }

    /// Most frequent value; ties go to the smallest value
    fn compute_mode_numeric(ca: &Float64Chunked) -> f64 {
        let mut values = Self::observed(ca);
        values.sort_by(|a, b| a.total_cmp(b));

        let mut best = (0.0, 0usize);
        let mut i = 0;
        while i < values.len() {
            let mut j = i;
            while j < values.len() && values[j] == values[i] {
                j += 1;
            }
            if j - i > best.1 {
                best = (values[i], j - i);
            }
            i = j;
        }
        best.0
    }

    /// Most frequent string; ties go to the lexicographically smallest
    fn compute_mode_string(ca: &StringChunked) -> Option<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for val in ca.into_iter().flatten() {
            *counts.entry(val).or_insert(0) += 1;
        }

        let mut best: Option<(&str, usize)> = None;
        for (value, count) in counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((value, count));
            }
        }
        best.map(|(v, _)| v.to_string())
    }

    fn compute_fill_value(&self, series: &Series) -> Result<ImputeValue> {
        match &self.strategy {
            ImputeStrategy::Mean => {
                let values = Self::observed(Self::numeric(series)?);
                let mean = if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                };
                Ok(ImputeValue::Numeric(mean))
            }
            ImputeStrategy::Median => {
                let mut values = Self::observed(Self::numeric(series)?);
                Ok(ImputeValue::Numeric(median(&mut values).unwrap_or(0.0)))
            }
            ImputeStrategy::MostFrequent => match series.dtype() {
                DataType::String => {
                    let mode = Self::compute_mode_string(series.str()?)
                        .unwrap_or_else(|| EMPTY_CATEGORY_FILL.to_string());
                    Ok(ImputeValue::String(mode))
                }
                _ => Ok(ImputeValue::Numeric(Self::compute_mode_numeric(
                    Self::numeric(series)?,
                ))),
            },
            ImputeStrategy::Constant(val) => Ok(ImputeValue::Numeric(*val)),
            ImputeStrategy::ConstantString(val) => Ok(ImputeValue::String(val.clone())),
        }
    }

    /// Values that count as observed: present and finite
    fn observed(ca: &Float64Chunked) -> Vec<f64> {
        ca.into_iter().flatten().filter(|v| v.is_finite()).collect()
    }

    fn numeric(series: &Series) -> Result<&Float64Chunked> {
        series.f64().map_err(|e| {
            PipelineError::PreprocessingError(format!("{}: {}", series.name(), e))
        })
    }

    fn fill_series(series: &Series, fill_value: &ImputeValue) -> Result<Series> {
        match fill_value {
            ImputeValue::Numeric(val) => {
                let filled: Float64Chunked = Self::numeric(series)?
                    .into_iter()
                    .map(|opt| Some(opt.filter(|v| v.is_finite()).unwrap_or(*val)))
                    .collect();

                Ok(filled.with_name(series.name().clone()).into_series())
            }
            ImputeValue::String(val) => {
                let ca = series.str().map_err(|e| {
                    PipelineError::PreprocessingError(format!("{}: {}", series.name(), e))
                })?;

                let filled: StringChunked = ca
                    .into_iter()
                    .map(|opt| Some(opt.unwrap_or(val.as_str())))
                    .collect();

                Ok(filled.with_name(series.name().clone()).into_series())
            }
        }
    }
}

/// Median with linear interpolation between the two middle values
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imputer_creation() {
        let imputer = Imputer::new(ImputeStrategy::Median);
        assert!(!imputer.is_fitted);
        assert_eq!(imputer.strategy(), &ImputeStrategy::Median);
    }

    #[test]
    fn test_median_imputation() {
        let df = df!("a" => &[Some(1.0), None, Some(3.0), Some(10.0)]).unwrap();

        let mut imputer = Imputer::new(ImputeStrategy::Median);
        let result = imputer.fit_transform(&df, &["a"]).unwrap();

        let col = result.column("a").unwrap().f64().unwrap();
        assert_eq!(col.null_count(), 0);
        assert_eq!(col.get(1), Some(3.0));
    }

    #[test]
    fn test_infinite_values_count_as_missing() {
        let df = df!(
            "dose" => &[Some(1.0), Some(f64::INFINITY), Some(5.0), Some(f64::NEG_INFINITY), None]
        )
        .unwrap();

        let mut imputer = Imputer::new(ImputeStrategy::Median);
        let result = imputer.fit_transform(&df, &["dose"]).unwrap();

        assert_eq!(imputer.fill_value("dose").as_deref(), Some("3"));
        let col = result.column("dose").unwrap().f64().unwrap();
        let values: Vec<f64> = col.into_no_null_iter().collect();
        assert_eq!(values, vec![1.0, 3.0, 5.0, 3.0, 3.0]);

        let mut mean = Imputer::new(ImputeStrategy::Mean);
        mean.fit(&df, &["dose"]).unwrap();
        assert_eq!(mean.fill_value("dose").as_deref(), Some("3"));
    }

    #[test]
    fn test_most_frequent_string_ties_pick_smallest() {
        let df = df!("race" => &[Some("b"), Some("a"), None, Some("b"), Some("a")]).unwrap();

        let mut imputer = Imputer::new(ImputeStrategy::MostFrequent);
        let result = imputer.fit_transform(&df, &["race"]).unwrap();

        assert_eq!(imputer.fill_value("race").as_deref(), Some("a"));
        let col = result.column("race").unwrap().str().unwrap();
        assert_eq!(col.get(2), Some("a"));
    }

    #[test]
    fn test_all_null_categorical() {
        let values: Vec<Option<&str>> = vec![None, None];
        let df = df!("x" => values).unwrap();

        let mut imputer = Imputer::new(ImputeStrategy::MostFrequent);
        imputer.fit(&df, &["x"]).unwrap();
        assert_eq!(imputer.fill_value("x").as_deref(), Some(EMPTY_CATEGORY_FILL));
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df!("a" => &[1.0]).unwrap();
        let imputer = Imputer::new(ImputeStrategy::Mean);
        assert!(matches!(imputer.transform(&df), Err(PipelineError::ModelNotFitted)));
    }
}
