//! Data loading utilities

use super::dataset_store::{read_arrow_shard, DatasetStore, Split};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// On-disk table format, detected from the path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
    Parquet,
    Json,
    JsonLines,
    /// Arrow IPC file (feather v2)
    ArrowFile,
    /// Arrow IPC stream, the shard format of the dataset store
    ArrowStream,
    /// Directory-based dataset store
    DatasetStore,
}

impl TableFormat {
    /// Detect the format from a directory or a file extension
    pub fn detect(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(TableFormat::DatasetStore);
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(TableFormat::Csv),
            "tsv" => Ok(TableFormat::Tsv),
            "parquet" | "pq" => Ok(TableFormat::Parquet),
            "json" => Ok(TableFormat::Json),
            "jsonl" | "ndjson" => Ok(TableFormat::JsonLines),
            "feather" | "ipc" => Ok(TableFormat::ArrowFile),
            "arrow" => Ok(TableFormat::ArrowStream),
            "" => Err(PipelineError::UnsupportedFormat(format!(
                "{} has no file extension",
                path.display()
            ))),
            other => Err(PipelineError::UnsupportedFormat(format!(".{}", other))),
        }
    }
}

/// Data loader for the supported table formats
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows scanned to infer CSV column types
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
        }
    }

    /// Set the number of rows used for CSV schema inference
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = n;
        self
    }

    /// Detect the format and load. A dataset store directory loads its train split.
    pub fn load(&self, path: &Path) -> Result<DataFrame> {
        self.load_split(path, Split::Train)
    }

    /// Load `split` from a dataset store directory, or the file itself otherwise
    pub fn load_split(&self, path: &Path, split: Split) -> Result<DataFrame> {
        let format = TableFormat::detect(path)?;
        if !path.exists() {
            return Err(PipelineError::FileNotFound(path.to_path_buf()));
        }

        let start = Instant::now();
        let df = match format {
            TableFormat::Csv => self.load_csv(path, b',')?,
            TableFormat::Tsv => self.load_csv(path, b'\t')?,
            TableFormat::Parquet => self.load_parquet(path)?,
            TableFormat::Json => self.load_json(path, JsonFormat::Json)?,
            TableFormat::JsonLines => self.load_json(path, JsonFormat::JsonLines)?,
            TableFormat::ArrowFile => self.load_ipc_file(path)?,
            TableFormat::ArrowStream => self.load_arrow(path)?,
            TableFormat::DatasetStore => {
                if DatasetStore::is_split_dir(path) {
                    DatasetStore::load_split_dir(path)?
                } else {
                    DatasetStore::open(path)?.load_split(split)?
                }
            }
        };

        debug!(
            path = %path.display(),
            format = ?format,
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded table"
        );
        Ok(df)
    }

    /// Load a delimited text file with a header row
    pub fn load_csv(&self, path: &Path, separator: u8) -> Result<DataFrame> {
        let parse_opts = CsvParseOptions::default().with_separator(separator);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()
            .map_err(|e| PipelineError::DataError(e.to_string()))
    }

    /// Load a Parquet file
    pub fn load_parquet(&self, path: &Path) -> Result<DataFrame> {
        ParquetReader::new(File::open(path)?)
            .finish()
            .map_err(|e| PipelineError::DataError(e.to_string()))
    }

    /// Load a JSON document (array of records) or JSON lines
    pub fn load_json(&self, path: &Path, format: JsonFormat) -> Result<DataFrame> {
        JsonReader::new(File::open(path)?)
            .with_json_format(format)
            .finish()
            .map_err(|e| PipelineError::DataError(e.to_string()))
    }

    /// Load an Arrow IPC file
    pub fn load_ipc_file(&self, path: &Path) -> Result<DataFrame> {
        IpcReader::new(File::open(path)?)
            .finish()
            .map_err(|e| PipelineError::DataError(e.to_string()))
    }

    /// Load an `.arrow` shard. When the shard sits inside a dataset store
    /// split, the whole split is loaded instead.
    pub fn load_arrow(&self, path: &Path) -> Result<DataFrame> {
        if let Some(parent) = path.parent() {
            if DatasetStore::is_split_dir(parent) {
                return DatasetStore::load_split_dir(parent);
            }
        }
        read_arrow_shard(path)
    }
}

/// Load a table from any supported format
pub fn load_table(path: impl AsRef<Path>) -> Result<DataFrame> {
    DataLoader::new().load(path.as_ref())
}

/// Load the training split. Store directories resolve to their `train` split.
pub fn load_train_split(path: impl AsRef<Path>) -> Result<DataFrame> {
    DataLoader::new().load_split(path.as_ref(), Split::Train)
}

/// Load the test split. Store directories resolve to their `test` split and
/// nothing else is read.
pub fn load_test_split(path: impl AsRef<Path>) -> Result<DataFrame> {
    DataLoader::new().load_split(path.as_ref(), Split::Test)
}

/// Fail with `MissingColumn` unless `df` has `column`
pub fn require_column(df: &DataFrame, column: &str) -> Result<()> {
    if df.get_column_names().iter().any(|c| c.as_str() == column) {
        Ok(())
    } else {
        Err(PipelineError::MissingColumn(column.to_string()))
    }
}

/// Load a table that must contain the target column
pub fn load_labeled_table(path: impl AsRef<Path>, target: &str) -> Result<DataFrame> {
    let df = load_table(path)?;
    require_column(&df, target)?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_detect_formats() {
        assert_eq!(TableFormat::detect(Path::new("a.csv")).unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::detect(Path::new("a.TSV")).unwrap(), TableFormat::Tsv);
        assert_eq!(TableFormat::detect(Path::new("a.pq")).unwrap(), TableFormat::Parquet);
        assert_eq!(TableFormat::detect(Path::new("a.jsonl")).unwrap(), TableFormat::JsonLines);
        assert_eq!(TableFormat::detect(Path::new("a.feather")).unwrap(), TableFormat::ArrowFile);
        assert_eq!(TableFormat::detect(Path::new("a.arrow")).unwrap(), TableFormat::ArrowStream);
    }

    #[test]
    fn test_detect_unsupported() {
        let err = TableFormat::detect(Path::new("data.xlsx")).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat(_)));
        let err = TableFormat::detect(Path::new("data")).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_table("/no/such/file.csv").unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }

    #[test]
    fn test_load_csv_and_require_target() {
        let mut file = tempfile::Builder::new()
            .suffix(".csv")
            .tempfile()
            .unwrap();
        writeln!(file, "age,race,readmitted").unwrap();
        writeln!(file, "50,Caucasian,1").unwrap();
        writeln!(file, "61,AfricanAmerican,0").unwrap();
        file.flush().unwrap();

        let df = load_labeled_table(file.path(), "readmitted").unwrap();
        assert_eq!(df.shape(), (2, 3));

        let err = load_labeled_table(file.path(), "outcome").unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn(c) if c == "outcome"));
    }
}
