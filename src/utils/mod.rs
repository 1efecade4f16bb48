//! Utility functions and types

pub mod data_loader;
pub mod dataset_store;

pub use data_loader::{
    load_labeled_table, load_table, load_test_split, load_train_split, require_column, DataLoader,
    TableFormat,
};
pub use dataset_store::{read_arrow_shard, DatasetStore, Split};

use polars::prelude::*;

/// Shape and column kinds of a table, one line per column
pub fn describe_table(df: &DataFrame) -> Vec<(String, crate::preprocessing::ColumnKind, usize)> {
    df.get_columns()
        .iter()
        .map(|c| {
            (
                c.name().to_string(),
                crate::preprocessing::ColumnKind::from_dtype(c.dtype()),
                c.null_count(),
            )
        })
        .collect()
}
