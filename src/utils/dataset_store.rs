//! Directory-based dataset store
//!
//! Layout on disk:
//!
//! ```text
//! <base>/dataset_dict.json        {"splits": ["train", "test"]}
//! <base>/train/state.json         {"_data_files": [{"filename": "data-00000-of-00001.arrow"}]}
//! <base>/train/data-00000-of-00001.arrow
//! <base>/test/...
//! ```
//!
//! Shards are Arrow IPC streams and are concatenated in the order listed by
//! `state.json`.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

const DATASET_DICT_FILE: &str = "dataset_dict.json";
const STATE_FILE: &str = "state.json";
const SHARD_EXTENSION: &str = "arrow";

/// Named dataset split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

impl std::fmt::Display for Split {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DatasetDictFile {
    splits: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    #[serde(rename = "_data_files")]
    data_files: Vec<DataFileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DataFileEntry {
    filename: String,
}

/// A dataset store rooted at a directory
#[derive(Debug, Clone)]
pub struct DatasetStore {
    base: PathBuf,
    splits: Vec<String>,
}

impl DatasetStore {
    /// Open a store, reading `dataset_dict.json` when present and otherwise
    /// treating every sub-directory that holds shards as a split.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let base = path.as_ref().to_path_buf();
        if !base.is_dir() {
            return Err(PipelineError::FileNotFound(base));
        }

        let dict_path = base.join(DATASET_DICT_FILE);
        let splits = if dict_path.is_file() {
            let dict: DatasetDictFile = serde_json::from_str(&fs::read_to_string(&dict_path)?)?;
            dict.splits
        } else {
            let mut names = Vec::new();
            for entry in fs::read_dir(&base)? {
                let entry = entry?;
                let path = entry.path();
                if path.is_dir() && !Self::shard_files(&path)?.is_empty() {
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        names.push(name.to_string());
                    }
                }
            }
            names.sort();
            names
        };

        debug!(base = %base.display(), splits = ?splits, "Opened dataset store");
        Ok(Self { base, splits })
    }

    /// Whether `path` is a single split directory (holds `state.json`)
    pub fn is_split_dir(path: &Path) -> bool {
        path.join(STATE_FILE).is_file()
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    pub fn splits(&self) -> &[String] {
        &self.splits
    }

    pub fn has_split(&self, name: &str) -> bool {
        self.splits.iter().any(|s| s == name)
    }

    pub fn split_path(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }

    /// Load one of the well-known splits
    pub fn load_split(&self, split: Split) -> Result<DataFrame> {
        self.load_named(split.as_str())
    }

    /// Load a split by name
    pub fn load_named(&self, name: &str) -> Result<DataFrame> {
        if !self.has_split(name) {
            return Err(PipelineError::DataError(format!(
                "split '{}' not found in {} (available: {})",
                name,
                self.base.display(),
                self.splits.join(", ")
            )));
        }
        Self::load_split_dir(&self.split_path(name))
    }

    /// Load every shard of a split directory and stack them
    pub fn load_split_dir(dir: &Path) -> Result<DataFrame> {
        let shards = Self::shard_files(dir)?;
        let mut iter = shards.iter();
        let first = iter.next().ok_or_else(|| {
            PipelineError::DataError(format!("no data shards in {}", dir.display()))
        })?;

        let mut df = read_arrow_shard(first)?;
        for shard in iter {
            let next = read_arrow_shard(shard)?;
            df.vstack_mut(&next)?;
        }

        debug!(dir = %dir.display(), shards = shards.len(), rows = df.height(), "Loaded split");
        Ok(df)
    }

    fn shard_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let state_path = dir.join(STATE_FILE);
        if state_path.is_file() {
            let state: StateFile = serde_json::from_str(&fs::read_to_string(&state_path)?)?;
            return Ok(state
                .data_files
                .into_iter()
                .map(|entry| dir.join(entry.filename))
                .collect());
        }

        let mut shards: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(SHARD_EXTENSION)
            })
            .collect();
        shards.sort();
        Ok(shards)
    }

    /// Write a store with one shard per split, replacing any existing files
    pub fn create(base: impl AsRef<Path>, splits: &mut [(&str, DataFrame)]) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;

        let mut names = Vec::with_capacity(splits.len());
        for (name, df) in splits.iter_mut() {
            let name: &str = *name;
            let split_dir = base.join(name);
            fs::create_dir_all(&split_dir)?;

            let shard_name = "data-00000-of-00001.arrow".to_string();
            let mut file = File::create(split_dir.join(&shard_name))?;
            IpcStreamWriter::new(&mut file).finish(df)?;

            let state = StateFile {
                data_files: vec![DataFileEntry { filename: shard_name }],
            };
            fs::write(split_dir.join(STATE_FILE), serde_json::to_string_pretty(&state)?)?;
            names.push(name.to_string());
        }

        let dict = DatasetDictFile { splits: names.clone() };
        fs::write(base.join(DATASET_DICT_FILE), serde_json::to_string_pretty(&dict)?)?;

        Ok(Self { base, splits: names })
    }
}

/// Read an Arrow shard, trying the stream format first and the file format second
pub fn read_arrow_shard(path: &Path) -> Result<DataFrame> {
    let stream = IpcStreamReader::new(File::open(path)?).finish();
    match stream {
        Ok(df) => Ok(df),
        Err(stream_err) => {
            debug!(path = %path.display(), error = %stream_err, "Not an IPC stream, trying IPC file");
            IpcReader::new(File::open(path)?)
                .finish()
                .map_err(|e| PipelineError::DataError(format!("{}: {}", path.display(), e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(offset: i64) -> DataFrame {
        df!(
            "age" => &[30 + offset, 40 + offset, 50 + offset],
            "readmitted" => &[0i64, 1, 0]
        )
        .unwrap()
    }

    #[test]
    fn test_split_names() {
        assert_eq!(Split::Train.as_str(), "train");
        assert_eq!(Split::Test.to_string(), "test");
    }

    #[test]
    fn test_create_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut splits = vec![("train", frame(0)), ("test", frame(5))];
        DatasetStore::create(dir.path(), &mut splits).unwrap();

        let store = DatasetStore::open(dir.path()).unwrap();
        assert_eq!(store.splits(), &["train".to_string(), "test".to_string()]);

        let train = store.load_split(Split::Train).unwrap();
        assert_eq!(train.shape(), (3, 2));
        let test = store.load_split(Split::Test).unwrap();
        let ages: Vec<i64> = test
            .column("age")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(ages, vec![35, 45, 55]);
    }

    #[test]
    fn test_missing_split() {
        let dir = tempfile::tempdir().unwrap();
        let mut splits = vec![("train", frame(0))];
        let store = DatasetStore::create(dir.path(), &mut splits).unwrap();
        let err = store.load_split(Split::Test).unwrap_err();
        assert!(matches!(err, PipelineError::DataError(_)));
    }

    #[test]
    fn test_open_without_dict_infers_splits() {
        let dir = tempfile::tempdir().unwrap();
        let mut splits = vec![("train", frame(0)), ("test", frame(1))];
        DatasetStore::create(dir.path(), &mut splits).unwrap();
        fs::remove_file(dir.path().join(DATASET_DICT_FILE)).unwrap();

        let store = DatasetStore::open(dir.path()).unwrap();
        assert_eq!(store.splits(), &["test".to_string(), "train".to_string()]);
    }

    #[test]
    fn test_open_missing_directory() {
        let err = DatasetStore::open("/definitely/not/here").unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }
}
