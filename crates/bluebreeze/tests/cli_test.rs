//! Integration tests for the `bluebreeze` binary.
//!
//! Every run uses the simulated producer, so nothing here needs a radio.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// `bluebreeze` with config lookups pointed at a nonexistent home and all
/// `BLUEBREEZE_*` overrides removed.
fn bluebreeze_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("bluebreeze");
    cmd.env("HOME", "/tmp/bluebreeze-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/bluebreeze-cli-test-nonexistent")
        .env_remove("BLUEBREEZE_CONFIG")
        .env_remove("BLUEBREEZE_STORE__DEFAULT_MTU")
        .env_remove("BLUEBREEZE_BRIDGE__MIN_SCAN_RSSI")
        .env_remove("BLUEBREEZE_LOG__FILTER")
        .env_remove("BLUEBREEZE_LOG__FORMAT")
        .env_remove("BLUEBREEZE_SIMULATOR__DEVICES")
        .env_remove("BLUEBREEZE_SIMULATOR__TICKS")
        .env_remove("BLUEBREEZE_SIMULATOR__INTERVAL_MS")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_lines(output: &std::process::Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_owned)
        .collect()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_usage() {
    let output = bluebreeze_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "missing usage:\n{stderr}");
}

#[test]
fn help_lists_subcommands() {
    bluebreeze_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("simulate").and(predicate::str::contains("config")),
    );
}

#[test]
fn version_flag() {
    bluebreeze_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("bluebreeze "));
}

#[test]
fn unknown_format_is_rejected() {
    bluebreeze_cmd()
        .args(["simulate", "--format", "yaml"])
        .assert()
        .code(2);
}

// ── simulate ────────────────────────────────────────────────────────

#[test]
fn simulate_json_emits_one_event_per_line() {
    let output = bluebreeze_cmd()
        .args([
            "simulate",
            "--devices",
            "2",
            "--ticks",
            "2",
            "--interval-ms",
            "0",
            "--format",
            "json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");

    let events: Vec<serde_json::Value> = stdout_lines(&output)
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let categories: Vec<&str> = events
        .iter()
        .map(|event| event["event"].as_str().unwrap())
        .collect();

    assert_eq!(
        &categories[..4],
        &["stateChanged", "authorizationChanged", "scanEnabledChanged", "devicesChanged"]
    );
    assert!(categories.contains(&"servicesChanged"));
    assert!(categories.contains(&"notifyEnabledChanged"));

    let heart_rate = events
        .iter()
        .find(|event| {
            event["event"] == "characteristicDataChanged"
                && event["payload"]["characteristicId"] == "00002a37-0000-1000-8000-00805f9b34fb"
        })
        .unwrap();
    assert_eq!(heart_rate["payload"]["deviceId"], "C0:FF:EE:00:00:00");
}

#[test]
fn simulate_text_output_is_aligned() {
    bluebreeze_cmd()
        .args(["simulate", "-d", "1", "-t", "1", "--interval-ms", "0"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("stateChanged              poweredOn")
                .and(predicate::str::contains("C0:FF:EE:00:00:00 mtu=247")),
        );
}

#[test]
fn rssi_filter_drops_weak_sightings() {
    let output = bluebreeze_cmd()
        .args([
            "simulate",
            "--devices",
            "3",
            "--ticks",
            "1",
            "--interval-ms",
            "0",
            "--min-rssi",
            "-55",
            "--format",
            "json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");

    let scans = stdout_lines(&output)
        .iter()
        .filter(|line| line.contains(r#""event":"scanResult""#))
        .count();
    // Sightings come in at -40, -52 and -64 dBm.
    assert_eq!(scans, 2);
}

#[test]
fn zero_devices_fails_validation() {
    bluebreeze_cmd()
        .args(["simulate", "--devices", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("simulator.devices"));
}

// ── config ──────────────────────────────────────────────────────────

#[test]
fn config_path_honors_flag() {
    bluebreeze_cmd()
        .args(["--config", "/tmp/somewhere/bb.toml", "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/somewhere/bb.toml"));
}

#[test]
fn config_show_prints_defaults() {
    bluebreeze_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[store]")
                .and(predicate::str::contains("default_mtu = 23"))
                .and(predicate::str::contains("[simulator]")),
        );
}

#[test]
fn config_init_writes_then_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let path_arg = path.to_str().unwrap();

    bluebreeze_cmd()
        .args(["--config", path_arg, "config", "init"])
        .assert()
        .success();
    assert!(std::fs::read_to_string(&path).unwrap().contains("[log]"));

    bluebreeze_cmd()
        .args(["--config", path_arg, "config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    bluebreeze_cmd()
        .args(["--config", path_arg, "config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn config_file_settings_feed_simulate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[simulator]\ndevices = 1\nticks = 1\ninterval_ms = 0\n",
    )
    .unwrap();

    let output = bluebreeze_cmd()
        .args(["--config", path.to_str().unwrap(), "simulate", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    let scans = stdout_lines(&output)
        .iter()
        .filter(|line| line.contains(r#""event":"scanResult""#))
        .count();
    assert_eq!(scans, 1);
}

#[test]
fn missing_explicit_config_fails() {
    bluebreeze_cmd()
        .args(["--config", "/tmp/bluebreeze-no-such-dir/config.toml", "simulate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
