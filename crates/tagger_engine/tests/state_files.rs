use std::fs;

use tagger_engine::{ensure_state_dir, load_or_create_machine_id, read_state_file, AtomicFileWriter};
use tempfile::TempDir;

#[test]
fn creates_missing_state_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("state");
    assert!(!new_dir.exists());
    ensure_state_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("metrics.ron", "(codes: {})").unwrap();
    assert_eq!(fs::read_to_string(&first).unwrap(), "(codes: {})");

    let second = writer.write("metrics.ron", "(codes: {\"05-03-10B\": {}})").unwrap();
    assert_eq!(first, second);
    assert_eq!(
        read_state_file(temp.path(), "metrics.ron").unwrap().as_deref(),
        Some("(codes: {\"05-03-10B\": {}})")
    );
}

#[test]
fn writing_into_a_file_path_fails_cleanly() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    assert!(writer.write("machine_id", "data").is_err());
    assert!(!file_path.with_file_name("machine_id").exists());
}

#[test]
fn missing_state_file_reads_as_none() {
    let temp = TempDir::new().unwrap();
    assert_eq!(read_state_file(temp.path(), "absent").unwrap(), None);
}

#[test]
fn machine_id_is_generated_once_and_reused() {
    let temp = TempDir::new().unwrap();
    let first = load_or_create_machine_id(temp.path()).unwrap();
    assert!(first.starts_with("MACHINE-"));
    assert_eq!(first.split('-').count(), 3);

    let second = load_or_create_machine_id(temp.path()).unwrap();
    assert_eq!(first, second);

    fs::write(temp.path().join("machine_id"), "MACHINE-1-fixed\n").unwrap();
    assert_eq!(
        load_or_create_machine_id(temp.path()).unwrap(),
        "MACHINE-1-fixed"
    );
}
