//! Data preprocessing module
//!
//! Turns a raw feature table into a dense `f64` matrix:
//! - Missing value imputation (median for numeric, most frequent for categorical)
//! - Feature scaling (StandardScaler, MinMaxScaler, RobustScaler)
//! - Categorical encoding (OneHot with unknown categories ignored, Ordinal)

mod config;
mod encoder;
mod imputer;
mod pipeline;
mod scaler;

pub use config::{PreprocessingConfig, UnknownCategory};
pub use encoder::{Encoder, EncoderType};
pub use imputer::{ImputeStrategy, Imputer};
pub use pipeline::FeaturePipeline;
pub use scaler::{Scaler, ScalerType};

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of a table column, derived from its dtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Boolean,
    Datetime,
}

impl ColumnKind {
    pub fn from_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64 => ColumnKind::Numeric,
            DataType::Boolean => ColumnKind::Boolean,
            DataType::Date | DataType::Datetime(_, _) | DataType::Duration(_) | DataType::Time => {
                ColumnKind::Datetime
            }
            _ => ColumnKind::Categorical,
        }
    }

    /// Parse the lower-case name used in the analysis artifact
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "numeric" => Some(ColumnKind::Numeric),
            "categorical" => Some(ColumnKind::Categorical),
            "boolean" => Some(ColumnKind::Boolean),
            "datetime" => Some(ColumnKind::Datetime),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Categorical => "categorical",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Datetime => "datetime",
        }
    }

    /// Booleans and timestamps are fed to the numeric branch
    pub fn is_numeric_branch(&self) -> bool {
        !matches!(self, ColumnKind::Categorical)
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split the columns of `df` (minus `exclude`) into numeric-branch and
/// categorical-branch names, keeping table order.
pub fn split_columns_by_kind(df: &DataFrame, exclude: &[&str]) -> (Vec<String>, Vec<String>) {
    let mut numeric = Vec::new();
    let mut categorical = Vec::new();
    for col in df.get_columns() {
        let name = col.name().as_str();
        if exclude.contains(&name) {
            continue;
        }
        if ColumnKind::from_dtype(col.dtype()).is_numeric_branch() {
            numeric.push(name.to_string());
        } else {
            categorical.push(name.to_string());
        }
    }
    (numeric, categorical)
}

/// Column as `Float64`. Temporal columns go through their physical integer
/// representation.
pub fn as_float_series(series: &Series) -> Result<Series> {
    let physical = series.to_physical_repr();
    physical
        .cast(&DataType::Float64)
        .map_err(|e| PipelineError::PreprocessingError(format!("{}: {}", series.name(), e)))
}

/// Column as `String`
pub fn as_string_series(series: &Series) -> Result<Series> {
    series
        .cast(&DataType::String)
        .map_err(|e| PipelineError::PreprocessingError(format!("{}: {}", series.name(), e)))
}
