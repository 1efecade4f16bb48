//! Integration test: table formats and the dataset store

mod common;

use common::{patient_table, write_csv, TARGET};
use polars::prelude::*;
use readmit_automl::error::PipelineError;
use readmit_automl::utils::{
    load_table, load_test_split, load_train_split, DatasetStore, Split,
};
use std::fs::File;
use tempfile::tempdir;

#[test]
fn test_csv_parquet_json_and_ipc_load_the_same_shape() {
    let dir = tempdir().unwrap();
    let df = patient_table(40, 41);

    let csv = dir.path().join("train.csv");
    write_csv(&df, &csv);

    let parquet = dir.path().join("train.parquet");
    ParquetWriter::new(File::create(&parquet).unwrap())
        .finish(&mut df.clone())
        .unwrap();

    let json = dir.path().join("train.json");
    JsonWriter::new(File::create(&json).unwrap())
        .with_json_format(JsonFormat::Json)
        .finish(&mut df.clone())
        .unwrap();

    let feather = dir.path().join("train.feather");
    IpcWriter::new(File::create(&feather).unwrap())
        .finish(&mut df.clone())
        .unwrap();

    for path in [&csv, &parquet, &json, &feather] {
        let loaded = load_table(path).unwrap();
        assert_eq!(loaded.shape(), (40, 16), "{}", path.display());
        assert!(loaded.column(TARGET).is_ok());
    }
}

#[test]
fn test_store_round_trip() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("readmission");
    let store = DatasetStore::create(
        &base,
        &mut [("train", patient_table(70, 42)), ("test", patient_table(30, 43))],
    )
    .unwrap();

    assert!(store.has_split("train"));
    assert_eq!(store.load_split(Split::Test).unwrap().shape(), (30, 16));

    assert_eq!(load_train_split(&base).unwrap().shape(), (70, 16));
    assert_eq!(load_test_split(&base).unwrap().shape(), (30, 16));
    assert_eq!(load_test_split(base.join("test")).unwrap().shape(), (30, 16));

    let shard = base.join("train").join("data-00000-of-00001.arrow");
    assert_eq!(load_table(&shard).unwrap().shape(), (70, 16));
}

#[test]
fn test_unsupported_and_missing() {
    let dir = tempdir().unwrap();
    let xlsx = dir.path().join("train.xlsx");
    std::fs::write(&xlsx, b"not a table").unwrap();
    assert!(matches!(
        load_table(&xlsx),
        Err(PipelineError::UnsupportedFormat(_))
    ));

    assert!(matches!(
        load_table(dir.path().join("absent.csv")),
        Err(PipelineError::FileNotFound(_))
    ));
}
