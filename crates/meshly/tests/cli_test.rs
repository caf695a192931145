//! Integration tests for the `meshly` CLI binary.
//!
//! These tests validate argument parsing, help output, and error
//! handling — all without requiring a live hub.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `meshly` binary with env isolation.
///
/// Clears all `MESHLY_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn meshly_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("meshly");
    cmd.env("HOME", "/tmp/meshly-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/meshly-cli-test-nonexistent")
        .env_remove("MESHLY_HUB")
        .env_remove("MESHLY_OUTPUT")
        .env_remove("MESHLY_TIMEOUT")
        .env_remove("MESHLY_SYNC_TIMEOUT");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = meshly_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    meshly_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("mesh")
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("groups"))
            .and(predicate::str::contains("scan")),
    );
}

#[test]
fn test_version_flag() {
    meshly_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("meshly"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = meshly_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success(), "Expected failure for invalid subcommand");
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_devices_list_no_hub() {
    meshly_cmd()
        .args(["devices", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("hub").or(predicate::str::contains("Hub")));
}

#[test]
fn test_invalid_hub_url() {
    meshly_cmd()
        .args(["--hub", "not a url", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid URL").or(predicate::str::contains("hub")));
}

#[test]
fn test_brightness_out_of_range() {
    // Brightness is a u8; 300 must fail at argument parsing.
    let output = meshly_cmd()
        .args(["devices", "brightness", "1", "300"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected clap usage error");
    let text = combined_output(&output);
    assert!(
        text.contains("invalid value") || text.contains("300"),
        "Expected range error:\n{text}"
    );
}

#[test]
fn test_invalid_output_format() {
    let output = meshly_cmd()
        .args(["--output", "invalid", "devices", "list"])
        .output()
        .unwrap();
    assert!(!output.status.success(), "Expected failure for invalid output format");
    let text = combined_output(&output);
    assert!(
        text.contains("invalid")
            || text.contains("possible values")
            || text.contains("valid value"),
        "Expected error about valid output formats:\n{text}"
    );
}

#[test]
fn test_factory_reset_requires_yes_when_piped() {
    // stdin is not a terminal under assert_cmd, so destructive commands
    // must refuse without --yes before ever touching the network. The
    // missing hub config fails first, which is also acceptable — either
    // way the command must not succeed.
    meshly_cmd()
        .args(["system", "factory-reset"])
        .assert()
        .failure();
}

// ── Config commands (no hub required) ───────────────────────────────

#[test]
fn test_config_path_prints_path() {
    meshly_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_defaults() {
    // No config file exists in the isolated env; show renders defaults.
    meshly_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("output").and(predicate::str::contains("table")));
}

#[test]
fn test_config_file_is_picked_up() {
    // Point XDG_CONFIG_HOME at a temp dir holding a real config file;
    // `config show` must reflect it.
    let dir = tempfile::tempdir().unwrap();
    let app_dir = dir.path().join("meshly");
    std::fs::create_dir_all(&app_dir).unwrap();
    std::fs::write(app_dir.join("config.toml"), "hub = \"http://hub.example\"\n").unwrap();

    meshly_cmd()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://hub.example"));
}

#[test]
fn test_config_show_json() {
    meshly_cmd()
        .args(["--output", "json", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"output\""));
}

// ── Subcommand help discovery ───────────────────────────────────────

#[test]
fn test_devices_subcommands_exist() {
    meshly_cmd().args(["devices", "--help"]).assert().success().stdout(
        predicate::str::contains("list")
            .and(predicate::str::contains("brightness"))
            .and(predicate::str::contains("examine"))
            .and(predicate::str::contains("remove")),
    );
}

#[test]
fn test_groups_subcommands_exist() {
    meshly_cmd().args(["groups", "--help"]).assert().success().stdout(
        predicate::str::contains("list")
            .and(predicate::str::contains("create"))
            .and(predicate::str::contains("add"))
            .and(predicate::str::contains("temp")),
    );
}

#[test]
fn test_scan_subcommands_exist() {
    meshly_cmd()
        .args(["scan", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mesh").and(predicate::str::contains("new")));
}

#[test]
fn test_system_subcommands_exist() {
    meshly_cmd().args(["system", "--help"]).assert().success().stdout(
        predicate::str::contains("passphrase")
            .and(predicate::str::contains("save"))
            .and(predicate::str::contains("import"))
            .and(predicate::str::contains("factory-reset")),
    );
}

#[test]
fn test_command_aliases() {
    // `dev` and `grp` are aliases; help must resolve through them.
    meshly_cmd()
        .args(["dev", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("list"));
    meshly_cmd()
        .args(["grp", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("create"));
}
