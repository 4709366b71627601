// The cargo_bin! macro requires build script setup that's overkill for simple tests.
// Suppress deprecation warning on the function until we need custom build-dir support.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use std::io::Write;
use std::process::Command;

#[test]
fn help_lists_the_core_surface() {
    let output = Command::new(cargo_bin("terrasim"))
        .arg("--help")
        .output()
        .expect("failed to execute");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    for flag in ["--config", "--seed", "--start", "--end"] {
        assert!(stdout.contains(flag), "missing {flag} in help");
    }
}

#[test]
fn unreadable_config_exits_with_code_one() {
    let output = Command::new(cargo_bin("terrasim"))
        .arg("--config")
        .arg("/nonexistent/terrasim.toml")
        .arg("--start")
        .arg("0")
        .arg("--end")
        .arg("1")
        .output()
        .expect("failed to execute");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn malformed_config_exits_with_code_one() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "this is [not toml").unwrap();
    let output = Command::new(cargo_bin("terrasim"))
        .arg("--config")
        .arg(file.path())
        .arg("--start")
        .arg("0")
        .arg("--end")
        .arg("1")
        .output()
        .expect("failed to execute");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn short_synthetic_run_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("end.snap.zip");
    let output = Command::new(cargo_bin("terrasim"))
        .arg("--seed")
        .arg("7")
        .arg("--start")
        .arg("-100")
        .arg("--end")
        .arg("-80")
        .arg("--polities")
        .arg("3")
        .arg("--snapshot-out")
        .arg(&snapshot)
        .output()
        .expect("failed to execute");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(snapshot.exists());
}

#[test]
fn missing_map_companion_fails() {
    let output = Command::new(cargo_bin("terrasim"))
        .arg("--map")
        .arg("/nonexistent/base.png")
        .output()
        .expect("failed to execute");
    assert!(!output.status.success());
}
