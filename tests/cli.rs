//! End-to-end CLI tests driving the `td` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn td_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("td");
    path
}

fn setup_test_env(backend: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[store]
backend = "{}"
path = "{}/data/taskdesk.sqlite"
data_dir = "{}/data"

[auth]
api_keys = ["cli-test-key"]
"#,
        backend,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("taskdesk.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_td(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = td_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run td binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_is_idempotent_sqlite() {
    let (_tmp, config_path) = setup_test_env("sqlite");

    let (stdout, stderr, success) = run_td(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let (_, _, success) = run_td(&config_path, &["init"]);
    assert!(success, "second init failed (not idempotent)");
}

#[test]
fn test_create_list_search_sqlite() {
    let (_tmp, config_path) = setup_test_env("sqlite");
    run_td(&config_path, &["init"]);

    let (stdout, stderr, success) = run_td(&config_path, &["create", "Buy milk", "2 liters"]);
    assert!(success, "create failed: {}{}", stdout, stderr);
    assert!(stdout.contains("Created task #1"));

    let (stdout, _, success) = run_td(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("Buy milk"));
    assert!(stdout.contains("\"status\": \"todo\""));

    let (stdout, _, success) = run_td(&config_path, &["search", "MILK"]);
    assert!(success);
    assert!(stdout.contains("Buy milk"), "search is case-insensitive");

    let (stdout, _, success) = run_td(&config_path, &["search", "zebra"]);
    assert!(success);
    assert!(!stdout.contains("Buy milk"));
}

#[test]
fn test_list_filter_rejects_unknown_status() {
    let (_tmp, config_path) = setup_test_env("sqlite");
    run_td(&config_path, &["init"]);

    let (_, stderr, success) = run_td(&config_path, &["list", "--status", "bogus"]);
    assert!(!success);
    assert!(stderr.contains("unknown status"));
}

#[test]
fn test_json_backend_end_to_end() {
    let (tmp, config_path) = setup_test_env("json");

    let (stdout, stderr, success) = run_td(&config_path, &["init"]);
    assert!(success, "init failed: {}{}", stdout, stderr);

    run_td(&config_path, &["create", "Walk the dog"]);

    // The collection file is plain JSON on disk.
    let raw = fs::read_to_string(tmp.path().join("data").join("tasks.json")).unwrap();
    assert!(raw.contains("Walk the dog"));
    assert!(raw.contains("\"nextId\": 2"));

    let (stdout, _, success) = run_td(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("Walk the dog"));
}

#[test]
fn test_stats_counts_created_tasks() {
    let (_tmp, config_path) = setup_test_env("sqlite");
    run_td(&config_path, &["init"]);
    run_td(&config_path, &["create", "one"]);
    run_td(&config_path, &["create", "two"]);

    let (stdout, _, success) = run_td(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("\"total\": 2"));
    assert!(stdout.contains("\"todo\": 2"));
}

#[test]
fn test_remind_with_no_due_tasks() {
    let (_tmp, config_path) = setup_test_env("sqlite");
    run_td(&config_path, &["init"]);
    run_td(&config_path, &["create", "someday"]);

    let (stdout, _, success) = run_td(&config_path, &["remind"]);
    assert!(success);
    assert!(stdout.contains("No tasks need a reminder"));
}

#[test]
fn test_detect_prints_detection_json() {
    let (_tmp, config_path) = setup_test_env("sqlite");
    run_td(&config_path, &["init"]);

    let (stdout, stderr, success) =
        run_td(&config_path, &["detect", "need to send the report by tomorrow, urgent"]);
    assert!(success, "detect failed: {}{}", stdout, stderr);
    assert!(stdout.contains("\"isTask\": true"));
    assert!(stdout.contains("\"deadlineDetected\": true"));
    assert!(stdout.contains("\"priority\": \"urgent\""));
}
