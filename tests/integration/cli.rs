//! Integration tests for the `quill` binary

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `quill` with an empty config directory
fn quill(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("quill").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.path());
    cmd
}

/// Helper function to create a test file
fn create_test_file(
    dir: &TempDir,
    name: &str,
    content: &str,
) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_eval_prints_results() {
    let home = TempDir::new().unwrap();
    quill(&home)
        .args(["eval", "set x 10; add x 5"])
        .assert()
        .success()
        .stdout("15\n")
        .stderr("");
}

#[test]
fn test_run_reports_error_and_keeps_earlier_output() {
    let home = TempDir::new().unwrap();
    let file = create_test_file(&home, "demo.ql", "print \"Hello\"\nadd 1 \"x\"\n");

    quill(&home)
        .arg("run")
        .arg(&file)
        .assert()
        .code(1)
        .stdout("Hello\n")
        .stderr(predicate::str::contains(
            "demo.ql:2:1:2:9: error: add: expected int, got string",
        ));
}

#[test]
fn test_run_from_stdin() {
    let home = TempDir::new().unwrap();
    quill(&home)
        .args(["run", "-"])
        .write_stdin("set n 4\nmul n n\n")
        .assert()
        .success()
        .stdout("16\n");
}

#[test]
fn test_readline_answered_from_stdin() {
    let home = TempDir::new().unwrap();
    let file = create_test_file(
        &home,
        "greet.ql",
        "set name (readline \"name? \")\nconcat \"hi \" name\n",
    );

    quill(&home)
        .arg("run")
        .arg(&file)
        .write_stdin("ada\n")
        .assert()
        .success()
        .stdout("hi ada\n");
}

#[test]
fn test_readline_at_end_of_input_cancels() {
    let home = TempDir::new().unwrap();
    let file = create_test_file(&home, "ask.ql", "print 1\nreadline\nprint 2\n");

    quill(&home)
        .arg("run")
        .arg(&file)
        .write_stdin("")
        .assert()
        .code(130)
        .stdout("1\n");
}

#[test]
fn test_check_does_not_run() {
    let home = TempDir::new().unwrap();
    let valid = create_test_file(&home, "ok.ql", "print \"side effect\"\n");
    quill(&home)
        .arg("check")
        .arg(&valid)
        .assert()
        .success()
        .stdout("")
        .stderr("");

    let invalid = create_test_file(&home, "bad.ql", "print )\n");
    quill(&home)
        .arg("check")
        .arg(&invalid)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("bad.ql:1:7: error: unexpected ')'"));
}

#[test]
fn test_json_diagnostics_flag() {
    let home = TempDir::new().unwrap();
    let output = quill(&home)
        .args(["eval", "--diagnostics", "json", "fail \"boom\""])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    let value: serde_json::Value = serde_json::from_str(stderr.trim()).unwrap();
    assert_eq!(value["source"], "<eval>");
    assert_eq!(value["kind"], "error");
    assert_eq!(value["message"], "boom");
}

#[test]
fn test_config_file_selects_diagnostic_format() {
    let home = TempDir::new().unwrap();
    let config = create_test_file(&home, "quill.toml", "[run]\ndiagnostics = \"json\"\n");

    quill(&home)
        .arg("--config")
        .arg(&config)
        .args(["eval", "nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("\"message\":\"unbound name 'nope'\""));
}

#[test]
fn test_missing_config_file_is_an_error() {
    let home = TempDir::new().unwrap();
    quill(&home)
        .args(["--config", "/nonexistent/quill.toml", "version"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_version() {
    let home = TempDir::new().unwrap();
    quill(&home)
        .arg("version")
        .assert()
        .success()
        .stdout(format!("Quill {}\n", env!("CARGO_PKG_VERSION")));
}
