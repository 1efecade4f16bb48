//! Builds the analysis artifact from a train table

use super::{write_artifact, AnalysisArtifact, DatasetPaths, FeatureSummary};
use crate::error::{PipelineError, Result};
use crate::preprocessing::{as_float_series, ColumnKind};
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Computes column kinds, missingness, class counts and correlations
#[derive(Debug, Clone)]
pub struct AnalysisProducer {
    target_column: String,
}

impl Default for AnalysisProducer {
    fn default() -> Self {
        Self::new("readmitted")
    }
}

impl AnalysisProducer {
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
        }
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Analyze `df`; the target column must be present
    pub fn analyze(&self, df: &DataFrame, paths: DatasetPaths) -> Result<AnalysisArtifact> {
        let target = df
            .column(&self.target_column)
            .map_err(|_| PipelineError::MissingColumn(self.target_column.clone()))?;

        let n_rows = df.height();
        let mut features = Vec::with_capacity(df.width());
        let mut numeric: Vec<(String, Vec<Option<f64>>)> = Vec::new();

        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let kind = ColumnKind::from_dtype(series.dtype());

            let n_missing = if matches!(kind, ColumnKind::Numeric | ColumnKind::Boolean) {
                let values = float_values(series)?;
                let missing = values.iter().filter(|v| v.is_none()).count();
                numeric.push((series.name().to_string(), values));
                missing
            } else {
                series.null_count()
            };

            features.push(FeatureSummary {
                name: series.name().to_string(),
                dtype: kind,
                pct_missing: if n_rows == 0 {
                    0.0
                } else {
                    n_missing as f64 / n_rows as f64 * 100.0
                },
            });
        }

        let class_distribution = class_distribution(target.as_materialized_series())?;
        let correlations = correlation_matrix(&numeric);

        info!(
            rows = n_rows,
            columns = features.len(),
            correlated = numeric.len(),
            "Analyzed dataset"
        );

        Ok(AnalysisArtifact {
            num_samples: n_rows,
            features,
            class_distribution,
            correlations,
            dataset_paths: paths,
        })
    }

    /// Analyze and write the artifact to `output`
    pub fn run(
        &self,
        df: &DataFrame,
        paths: DatasetPaths,
        output: impl AsRef<Path>,
    ) -> Result<AnalysisArtifact> {
        let artifact = self.analyze(df, paths)?;
        write_artifact(&artifact, output.as_ref())?;
        info!(path = %output.as_ref().display(), "Analysis artifact written");
        Ok(artifact)
    }
}

/// Column as optional floats; NaN and infinities count as missing
fn float_values(series: &Series) -> Result<Vec<Option<f64>>> {
    let cast = as_float_series(series)?;
    let values = cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();
    Ok(values)
}

/// Target label -> count. Integral values render without a fraction.
fn class_distribution(target: &Series) -> Result<BTreeMap<String, usize>> {
    let mut counts = BTreeMap::new();
    let kind = ColumnKind::from_dtype(target.dtype());

    if matches!(kind, ColumnKind::Numeric | ColumnKind::Boolean) {
        for value in float_values(target)? {
            let label = match value {
                None => "null".to_string(),
                Some(v) if v.fract() == 0.0 => format!("{}", v as i64),
                Some(v) => v.to_string(),
            };
            *counts.entry(label).or_insert(0) += 1;
        }
    } else {
        let strings = target.cast(&DataType::String)?;
        for value in strings.str()?.into_iter() {
            let label = value.unwrap_or("null").to_string();
            *counts.entry(label).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

/// Pearson correlation over rows where both values are present
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    let n = pairs.len() as f64;
    if pairs.len() < 2 {
        return None;
    }

    let x_mean = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let y_mean = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_y2 = 0.0;
    for &(xi, yi) in &pairs {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        sum_xy += dx * dy;
        sum_x2 += dx * dx;
        sum_y2 += dy * dy;
    }

    let denom = (sum_x2 * sum_y2).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        None
    } else {
        Some((sum_xy / denom).clamp(-1.0, 1.0))
    }
}

fn correlation_matrix(
    columns: &[(String, Vec<Option<f64>>)],
) -> BTreeMap<String, BTreeMap<String, Option<f64>>> {
    columns
        .par_iter()
        .map(|(name_i, values_i)| {
            let row: BTreeMap<String, Option<f64>> = columns
                .iter()
                .map(|(name_j, values_j)| (name_j.clone(), pearson(values_i, values_j)))
                .collect();
            (name_i.clone(), row)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect()
}
