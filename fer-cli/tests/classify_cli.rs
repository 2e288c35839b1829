mod common;

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::tempdir;

use common::write_face;

#[test]
fn help_lists_core_flags() {
    let output = cargo_bin_cmd!("fer-cli")
        .arg("--help")
        .output()
        .expect("run fer-cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--input", "--model", "--top-n", "--json", "--scores", "--jobs"] {
        assert!(stdout.contains(flag), "help is missing {flag}");
    }
}

#[test]
fn missing_model_fails_fast() {
    let dir = tempdir().expect("tempdir");
    write_face(dir.path(), "face.png", 64, 64, 120);
    let json_path = dir.path().join("out.json");

    let output = cargo_bin_cmd!("fer-cli")
        .arg("--input")
        .arg(dir.path())
        .arg("--model")
        .arg(dir.path().join("missing.onnx"))
        .arg("--json")
        .arg(&json_path)
        .output()
        .expect("run fer-cli");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to load model"),
        "unexpected stderr: {stderr}"
    );
    assert!(!json_path.exists());
}

#[test]
fn out_of_range_top_n_is_rejected() {
    let dir = tempdir().expect("tempdir");
    write_face(dir.path(), "face.png", 64, 64, 120);

    let output = cargo_bin_cmd!("fer-cli")
        .arg("--input")
        .arg(dir.path())
        .args(["--top-n", "9"])
        .output()
        .expect("run fer-cli");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid argument"), "unexpected stderr: {stderr}");
}

#[test]
fn empty_directory_writes_an_empty_array() {
    let dir = tempdir().expect("tempdir");
    let faces = dir.path().join("faces");
    fs::create_dir(&faces).expect("faces dir");
    let json_path = dir.path().join("out.json");

    let output = cargo_bin_cmd!("fer-cli")
        .arg("--input")
        .arg(&faces)
        .arg("--json")
        .arg(&json_path)
        .output()
        .expect("run fer-cli");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No files found"), "unexpected stderr: {stderr}");

    let records: Value =
        serde_json::from_str(&fs::read_to_string(&json_path).expect("read json")).expect("json");
    assert_eq!(records, Value::Array(Vec::new()));
}

#[test]
fn directory_run_writes_records_in_traversal_order() {
    let model = require_model!();
    let dir = tempdir().expect("tempdir");
    let faces = dir.path().join("faces");
    fs::create_dir(&faces).expect("faces dir");
    write_face(&faces, "a.png", 1024, 768, 200);
    fs::write(faces.join("b.png"), b"definitely not a png").expect("corrupt file");
    write_face(&faces, "c.jpg", 32, 32, 60);
    let json_path = dir.path().join("out").join("emotions.json");

    let mut cmd = cargo_bin_cmd!("fer-cli");
    cmd.arg("--input")
        .arg(&faces)
        .arg("--model")
        .arg(&model)
        .args(["--top-n", "2", "--scores", "--jobs", "2"])
        .arg("--json")
        .arg(&json_path);
    cmd.assert().success();

    let records: Value =
        serde_json::from_str(&fs::read_to_string(&json_path).expect("read json")).expect("json");
    let records = records.as_array().expect("array");
    assert_eq!(records.len(), 2);
    assert!(records[0]["image"].as_str().unwrap().ends_with("a.png"));
    assert!(records[1]["image"].as_str().unwrap().ends_with("c.jpg"));

    for record in records {
        let labels = record["result"].as_array().expect("labels");
        assert_eq!(labels.len(), 2);
        assert_ne!(labels[0], labels[1]);
        for key in ["grayscale", "resize", "model"] {
            assert!(record["runtime"][key].as_f64().is_some(), "{key}");
        }
        let scores = record["scores"].as_object().expect("scores");
        assert_eq!(scores.len(), 8);
        let sum: f64 = scores.values().filter_map(Value::as_f64).sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }
}

#[test]
fn single_file_prints_json_to_stdout() {
    let model = require_model!();
    let dir = tempdir().expect("tempdir");
    let face = write_face(dir.path(), "face.png", 48, 48, 150);

    let output = cargo_bin_cmd!("fer-cli")
        .arg("--input")
        .arg(&face)
        .arg("--model")
        .arg(&model)
        .output()
        .expect("run fer-cli");
    assert!(output.status.success());

    let records: Value = serde_json::from_slice(&output.stdout).expect("stdout json");
    let records = records.as_array().expect("array");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["result"].as_array().unwrap().len(), 1);
    assert!(records[0].get("scores").is_none());
}
