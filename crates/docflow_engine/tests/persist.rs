use std::fs;

use docflow_engine::{ensure_output_dir, AtomicFileWriter};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("downloads");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing_artifact() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("report_abc.docx", b"first").unwrap();
    assert_eq!(first.file_name().unwrap(), "report_abc.docx");
    assert_eq!(fs::read(&first).unwrap(), b"first");

    let second = writer.write("report_abc.docx", b"second").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(&second).unwrap(), b"second");
}

#[test]
fn no_partial_file_when_output_is_not_a_dir() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write("batch_download_1.zip", b"PK");
    assert!(result.is_err());
    assert!(!file_path.with_file_name("batch_download_1.zip").exists());
}
