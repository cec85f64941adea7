use predicates::prelude::*;
use std::fs;

const MANUSCRIPT: &str = r#"{
    "book": { "id": "b1", "title": "Small Gardens", "author": "R. Vale" },
    "parts": [
        { "part_index": 0, "part_type": "cover", "content": "{}" },
        { "part_index": 1, "part_type": "copyright", "content": "" },
        { "part_index": 2, "part_type": "introduction",
          "content": { "title": "Why grow", "content": "Start **small**.\n\nThen grow." } },
        { "part_index": 3, "part_type": "chapter_title", "content": "{\"title\":\"Soil\"}" }
    ]
}"#;

fn write_manuscript(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("book.json");
    fs::write(&path, MANUSCRIPT).unwrap();
    path
}

#[test]
fn test_binary_returns_failure_when_no_input() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bookpress");
    cmd.assert().failure();
}

#[test]
fn test_binary_prints_default_configuration() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bookpress");
    cmd.arg("--get-default-configuration");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("[page]").and(predicate::str::contains("[stamp]")));
}

#[test]
fn test_binary_dry_run_succeeds_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_manuscript(dir.path());
    let output = dir.path().join("book.pdf");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bookpress");
    cmd.arg("-p")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--dry-run");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Dry-run"));
    assert!(!output.exists());
}

#[test]
fn test_binary_writes_each_format() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_manuscript(dir.path());

    for (format, magic) in [
        ("html", b"<!DOCTYPE html>".as_slice()),
        ("pdf", b"%PDF-".as_slice()),
        ("docx", b"PK".as_slice()),
    ] {
        let output = dir.path().join(format!("out.{}", format));
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bookpress");
        cmd.arg("-p")
            .arg(&input)
            .arg("-f")
            .arg(format)
            .arg("-o")
            .arg(&output)
            .arg("-q");
        cmd.assert().success();
        let bytes = fs::read(&output).unwrap();
        assert!(bytes.starts_with(magic), "{} output has the wrong header", format);
    }
}

#[test]
fn test_binary_store_keeps_part_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_manuscript(dir.path());
    let store = dir.path().join("store");
    let output = dir.path().join("book.pdf");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bookpress");
    cmd.arg("-p")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--store")
        .arg(&store);
    cmd.assert().success();

    let parts: Vec<_> = fs::read_dir(store.join("books/b1/parts"))
        .unwrap()
        .collect();
    assert_eq!(parts.len(), 4);
    assert!(store.join("books/b1/book.pdf").is_file());
    let doc = lopdf::Document::load(&output).unwrap();
    assert_eq!(doc.get_pages().len(), 4);
}

#[test]
fn test_binary_uses_configured_storage_root() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_manuscript(dir.path());
    let store = dir.path().join("configured-store");
    let config = dir.path().join("bookpress.toml");
    fs::write(
        &config,
        format!("[storage]\nroot = {:?}\n", store.display().to_string()),
    )
    .unwrap();
    let output = dir.path().join("book.pdf");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bookpress");
    cmd.arg("-p")
        .arg(&input)
        .arg("-c")
        .arg(&config)
        .arg("-o")
        .arg(&output)
        .arg("-q");
    cmd.assert().success();

    assert_eq!(fs::read_dir(store.join("books/b1/parts")).unwrap().count(), 4);
    assert!(store.join("books/b1/book.pdf").is_file());
    assert!(output.is_file());
}

#[test]
fn test_binary_split_and_dump_model() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_manuscript(dir.path());
    let split = dir.path().join("parts");
    let model = dir.path().join("model.json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bookpress");
    cmd.arg("-p")
        .arg(&input)
        .arg("-f")
        .arg("html")
        .arg("-o")
        .arg(dir.path().join("book.html"))
        .arg("--split")
        .arg(&split)
        .arg("--dump-model")
        .arg(&model);
    cmd.assert().success();

    assert!(split.join("0000-cover.html").is_file());
    assert!(split.join("0003-chapter_title.html").is_file());
    let dumped = fs::read_to_string(&model).unwrap();
    assert!(dumped.contains("\"kind\": \"introduction\""));
}

#[test]
fn test_binary_rejects_malformed_manuscript() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.json");
    fs::write(&input, "{ not json").unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bookpress");
    cmd.arg("-p").arg(&input).arg("-o").arg(dir.path().join("x.pdf"));
    cmd.assert().failure();
}

#[test]
fn test_binary_fails_for_missing_output_directory() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_manuscript(dir.path());

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bookpress");
    cmd.arg("-p")
        .arg(&input)
        .arg("-o")
        .arg(dir.path().join("missing/book.pdf"));
    cmd.assert().failure();
}
