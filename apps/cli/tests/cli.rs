//! rover-cli 端到端测试（不需要硬件）

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn rover_cli(config_home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("rover-cli").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home).env("RUST_LOG", "off");
    cmd
}

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn help_lists_subcommands() {
    let home = tempfile::tempdir().unwrap();
    rover_cli(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("drive"))
        .stdout(predicate::str::contains("send"))
        .stdout(predicate::str::contains("ports"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn config_check_accepts_valid_file() {
    let home = tempfile::tempdir().unwrap();
    let file = write_config("[arbiter]\ncooldown_ms = 500\nobstacle_threshold_cm = 20\n");

    rover_cli(home.path())
        .args(["config", "check"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("✅"));
}

#[test]
fn config_check_rejects_zero_threshold() {
    let home = tempfile::tempdir().unwrap();
    let file = write_config("[debounce]\nstability_threshold = 0\n");

    rover_cli(home.path()).args(["config", "check"]).arg(file.path()).assert().failure();
}

#[test]
fn config_show_uses_explicit_file() {
    let home = tempfile::tempdir().unwrap();
    let file = write_config("[serial]\nbaud = 115200\n");

    rover_cli(home.path())
        .arg("--config")
        .arg(file.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("baud = 115200"));
}

#[test]
fn config_init_writes_default_file() {
    let home = tempfile::tempdir().unwrap();
    let output = home.path().join("rover.toml");

    rover_cli(home.path())
        .args(["config", "init", "--output"])
        .arg(&output)
        .assert()
        .success();
    assert!(output.exists());

    rover_cli(home.path())
        .args(["config", "init", "--output"])
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn send_rejects_unknown_command_before_connecting() {
    let home = tempfile::tempdir().unwrap();
    rover_cli(home.path())
        .args(["send", "--port", "/nonexistent/tty", "jump"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("无效指令"));
}

#[test]
fn send_fails_on_missing_port() {
    let home = tempfile::tempdir().unwrap();
    rover_cli(home.path())
        .args(["send", "--port", "/nonexistent/tty", "x"])
        .assert()
        .failure();
}
