//! Integration test: the `readmit` binary's exit status and error output

mod common;

use common::{patient_table, write_csv};
use std::process::{Command, Output};
use tempfile::tempdir;

fn readmit(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_readmit"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .unwrap()
}

#[test]
fn test_evaluate_missing_model_exits_with_one() {
    let dir = tempdir().unwrap();
    let test_csv = dir.path().join("test.csv");
    write_csv(&patient_table(20, 51), &test_csv);
    let model = dir.path().join("absent_model.json");

    let output = readmit(&[
        "evaluate",
        "--model_path",
        model.to_str().unwrap(),
        "--test_path",
        test_csv.to_str().unwrap(),
    ]);

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("❌ Evaluation failed:"), "{}", stderr);
}

#[test]
fn test_info_on_unsupported_file_exits_with_one() {
    let dir = tempdir().unwrap();
    let sheet = dir.path().join("patients.xlsx");
    std::fs::write(&sheet, b"not a table").unwrap();

    let output = readmit(&["info", "--data", sheet.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("❌ Inspection failed:"), "{}", stderr);
}
