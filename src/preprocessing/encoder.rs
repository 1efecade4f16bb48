//! Categorical encoding implementations

use super::UnknownCategory;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Type of encoder to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncoderType {
    /// One indicator column per category
    OneHot,
    /// Category index as a single column (unknown -> -1)
    Ordinal,
}

/// Categorical encoder over `String` columns.
///
/// Categories are kept sorted, so the output layout does not depend on row
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encoder {
    encoder_type: EncoderType,
    unknown: UnknownCategory,
    columns: Vec<String>,
    categories: HashMap<String, Vec<String>>,
    is_fitted: bool,
}

impl Encoder {
    /// Create a new encoder
    pub fn new(encoder_type: EncoderType) -> Self {
        Self {
            encoder_type,
            unknown: UnknownCategory::Ignore,
            columns: Vec::new(),
            categories: HashMap::new(),
            is_fitted: false,
        }
    }

    pub fn with_unknown(mut self, unknown: UnknownCategory) -> Self {
        self.unknown = unknown;
        self
    }

    /// Fit the encoder to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.columns.clear();
        self.categories.clear();

        for col_name in columns {
            let ca = Self::strings(df, col_name)?;
            let categories: BTreeSet<&str> = ca.into_iter().flatten().collect();
            self.columns.push(col_name.to_string());
            self.categories.insert(
                col_name.to_string(),
                categories.into_iter().map(String::from).collect(),
            );
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Encoded columns only, in `feature_names()` order
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let names = self.feature_names();
        let mut next_name = names.into_iter();
        let mut out: Vec<Column> = Vec::with_capacity(self.n_features());
        for col_name in &self.columns {
            let ca = Self::strings(df, col_name)?;
            let categories = self.categories_for(col_name);
            let index: HashMap<&str, usize> = categories
                .iter()
                .enumerate()
                .map(|(i, c)| (c.as_str(), i))
                .collect();

            let codes: Vec<Option<usize>> = ca
                .into_iter()
                .map(|v| v.and_then(|s| index.get(s).copied()))
                .collect();

            if self.unknown == UnknownCategory::Error {
                if let Some(bad) = ca
                    .into_iter()
                    .zip(&codes)
                    .find_map(|(v, code)| if code.is_none() { Some(v) } else { None })
                {
                    return Err(PipelineError::PreprocessingError(format!(
                        "unknown category {:?} in column '{}'",
                        bad, col_name
                    )));
                }
            }

            match self.encoder_type {
                EncoderType::OneHot => {
                    for i in 0..categories.len() {
                        let values: Vec<f64> = codes
                            .iter()
                            .map(|c| if *c == Some(i) { 1.0 } else { 0.0 })
                            .collect();
                        let name = next_name.next().ok_or_else(|| {
                            PipelineError::PreprocessingError(format!(
                                "no output name for '{}' category {}",
                                col_name, i
                            ))
                        })?;
                        out.push(Column::new(name.into(), values));
                    }
                }
                EncoderType::Ordinal => {
                    let values: Vec<f64> = codes
                        .iter()
                        .map(|c| c.map_or(-1.0, |i| i as f64))
                        .collect();
                    out.push(Column::new(col_name.as_str().into(), values));
                }
            }
        }

        if out.is_empty() {
            return Ok(DataFrame::empty());
        }
        Ok(DataFrame::new(out)?)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Sorted categories seen for `column` during fit
    pub fn categories_for(&self, column: &str) -> &[String] {
        self.categories
            .get(column)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// Names of the produced columns
    ///
    /// One-hot names are `<column>_<category>`; a name already taken gets a
    /// numeric suffix (`a_b_c_1`), so every name is distinct.
    pub fn feature_names(&self) -> Vec<String> {
        match self.encoder_type {
            EncoderType::OneHot => {
                let mut taken: HashSet<String> = HashSet::with_capacity(self.n_features());
                let mut names = Vec::with_capacity(self.n_features());
                for col in &self.columns {
                    for cat in self.categories_for(col) {
                        let base = format!("{}_{}", col, cat);
                        let mut name = base.clone();
                        let mut suffix = 1;
                        while taken.contains(&name) {
                            name = format!("{}_{}", base, suffix);
                            suffix += 1;
                        }
                        taken.insert(name.clone());
                        names.push(name);
                    }
                }
                names
            }
            EncoderType::Ordinal => self.columns.clone(),
        }
    }

    pub fn n_features(&self) -> usize {
        match self.encoder_type {
            EncoderType::OneHot => self.columns.iter().map(|c| self.categories_for(c).len()).sum(),
            EncoderType::Ordinal => self.columns.len(),
        }
    }

    fn strings<'a>(df: &'a DataFrame, col_name: &str) -> Result<&'a StringChunked> {
        let column = df
            .column(col_name)
            .map_err(|_| PipelineError::MissingColumn(col_name.to_string()))?;
        column
            .as_materialized_series()
            .str()
            .map_err(|e| PipelineError::PreprocessingError(format!("{}: {}", col_name, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!("race" => &["b", "a", "c", "a"]).unwrap()
    }

    #[test]
    fn test_onehot_sorted_categories() {
        let mut encoder = Encoder::new(EncoderType::OneHot);
        let result = encoder.fit_transform(&frame(), &["race"]).unwrap();

        assert_eq!(encoder.feature_names(), vec!["race_a", "race_b", "race_c"]);
        assert_eq!(result.width(), 3);
        let a: Vec<Option<f64>> = result.column("race_a").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(a, vec![Some(0.0), Some(1.0), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn test_onehot_unknown_is_all_zeros() {
        let mut encoder = Encoder::new(EncoderType::OneHot);
        encoder.fit(&frame(), &["race"]).unwrap();

        let unseen = df!("race" => &["z"]).unwrap();
        let result = encoder.transform(&unseen).unwrap();
        for col in result.get_columns() {
            assert_eq!(col.f64().unwrap().get(0), Some(0.0));
        }
    }

    #[test]
    fn test_unknown_error_mode() {
        let mut encoder = Encoder::new(EncoderType::OneHot).with_unknown(UnknownCategory::Error);
        encoder.fit(&frame(), &["race"]).unwrap();

        let unseen = df!("race" => &["z"]).unwrap();
        assert!(matches!(
            encoder.transform(&unseen),
            Err(PipelineError::PreprocessingError(_))
        ));
    }

    #[test]
    fn test_onehot_names_stay_distinct_across_columns() {
        // "a" + "b_c" and "a_b" + "c" both render as "a_b_c"
        let df = df!("a" => &["b_c", "x"], "a_b" => &["c", "y"]).unwrap();
        let mut encoder = Encoder::new(EncoderType::OneHot);
        let result = encoder.fit_transform(&df, &["a", "a_b"]).unwrap();

        assert_eq!(
            encoder.feature_names(),
            vec!["a_b_c", "a_x", "a_b_c_1", "a_b_y"]
        );
        assert_eq!(result.width(), 4);
        let renamed: Vec<Option<f64>> = result.column("a_b_c_1").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(renamed, vec![Some(1.0), Some(0.0)]);
    }

    #[test]
    fn test_ordinal() {
        let mut encoder = Encoder::new(EncoderType::Ordinal);
        let result = encoder.fit_transform(&frame(), &["race"]).unwrap();
        let codes: Vec<Option<f64>> = result.column("race").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(codes, vec![Some(1.0), Some(0.0), Some(2.0), Some(0.0)]);
    }
}
