//! CLI smoke tests: drive the built binary against a scratch data dir.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn cli_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_augur"));
    // Keep tests independent of the developer's environment.
    cmd.env_remove("AUGUR_DATA_DIR")
        .env_remove("AUGUR_CONFIG")
        .env("RUST_LOG", "warn");
    cmd
}

fn in_dir(data: &Path) -> Command {
    let mut cmd = cli_bin();
    cmd.arg("--config")
        .arg(data.join("missing.toml"))
        .arg("--data-dir")
        .arg(data);
    cmd
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "Expected usage info in --help output");
    assert!(stdout.contains("thresholds"));
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("augur"), "Expected binary name in --version output");
}

#[test]
fn test_status_on_fresh_dir() {
    let dir = TempDir::new().unwrap();
    let output = in_dir(dir.path()).arg("status").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Cycle:     0"), "got: {}", stdout);
    assert!(stdout.contains("no evaluations yet"));
}

#[test]
fn test_cycle_then_status_json() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.json");
    fs::write(
        &input,
        r#"{"stimuli": [{"emotion": "fear", "intensity": 0.8, "source": "whale", "category": "whale_transfer_fear"}]}"#,
    )
    .unwrap();

    let output = in_dir(dir.path())
        .arg("cycle")
        .arg(&input)
        .output()
        .expect("failed to run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["cycle"], 1);
    assert_eq!(report["state"]["dominant_label"], "terror");

    let output = in_dir(dir.path())
        .args(["status", "--json"])
        .output()
        .expect("failed to run");
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["cycle"], 1);
    assert_eq!(status["streak"]["emotion"], "fear");
}

#[test]
fn test_cycle_with_missing_input_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let output = in_dir(dir.path())
        .args(["cycle", "does_not_exist.json"])
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read cycle input"), "got: {}", stderr);
}

#[test]
fn test_thresholds_listed() {
    let dir = TempDir::new().unwrap();
    let output = in_dir(dir.path()).arg("thresholds").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("whale_transfer"));
    assert!(stdout.contains("ask_imbalance"));
}

#[test]
fn test_run_once_consumes_inbox() {
    let dir = TempDir::new().unwrap();
    let inbox = dir.path().join("inbox");
    fs::create_dir_all(&inbox).unwrap();
    fs::write(inbox.join("001.json"), r#"{"metrics": {"gas_price": 80}}"#).unwrap();

    let output = in_dir(dir.path())
        .args(["run", "--once", "--inbox"])
        .arg(&inbox)
        .output()
        .expect("failed to run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(!inbox.join("001.json").exists());
    assert!(inbox.join("processed").join("001.json").exists());
    assert!(dir.path().join("cycle_meta.json").exists());
}

#[test]
fn test_reset_removes_state() {
    let dir = TempDir::new().unwrap();
    let output = in_dir(dir.path()).args(["run", "--once"]).output().expect("failed to run");
    assert!(output.status.success());
    assert!(dir.path().join("emotion_state.json").exists());

    let output = in_dir(dir.path()).arg("reset").output().expect("failed to run");
    assert!(output.status.success());
    assert!(!dir.path().join("emotion_state.json").exists());
}

#[test]
fn test_invalid_config_does_not_panic() {
    // A nonexistent config file falls back to defaults
    let output = cli_bin()
        .arg("--config")
        .arg("/tmp/nonexistent_augur_config_12345.toml")
        .arg("--help")
        .output()
        .expect("failed to run");
    assert!(output.status.success());
}

#[test]
fn test_config_fallback_is_logged() {
    let dir = TempDir::new().unwrap();
    let output = in_dir(dir.path())
        .env("RUST_LOG", "info")
        .arg("status")
        .output()
        .expect("failed to run");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("using defaults"), "got: {}", stderr);
}

fn tvl_weight(data: &Path) -> f64 {
    let output = in_dir(data)
        .args(["status", "--json"])
        .output()
        .expect("failed to run");
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    status["weights"]["tvl_sentiment"].as_f64().unwrap()
}

#[test]
fn test_replayed_inbox_file_not_applied_twice() {
    let dir = TempDir::new().unwrap();
    let inbox = dir.path().join("inbox");
    fs::create_dir_all(&inbox).unwrap();
    let input = r#"{"adjustments": [{"category": "tvl_sentiment", "direction": "increase", "magnitude": "strong"}]}"#;
    fs::write(inbox.join("001.json"), input).unwrap();

    let run_once = || {
        let output = in_dir(dir.path())
            .args(["run", "--once", "--inbox"])
            .arg(&inbox)
            .output()
            .expect("failed to run");
        assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    };
    run_once();
    let after_first = tvl_weight(dir.path());
    assert!(after_first > 1.1);

    // The file reappears as if archiving never happened
    fs::rename(inbox.join("processed").join("001.json"), inbox.join("001.json")).unwrap();
    run_once();
    assert!(!inbox.join("001.json").exists());
    assert!(inbox.join("processed").join("001.json").exists());
    assert!(tvl_weight(dir.path()) <= after_first);
}
