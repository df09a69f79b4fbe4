//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

/// Build command for the pinguard binary, isolated from the caller's pinout settings.
fn pinguard_cli() -> Command {
    let mut cmd = cargo_bin_cmd!("pinguard");
    cmd.env_remove("PINGUARD_PINOUTS")
        .env_remove("PINGUARD_PINOUTS_URL")
        .env_remove("PINGUARD_LOG");
    cmd
}

/// Path to pinguard library test fixtures (relative to workspace).
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("pinguard")
        .join("tests")
        .join("fixtures")
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().unwrap();
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn test_cli_help() {
    let mut cmd = pinguard_cli();

    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ESPHome"));
}

#[test]
fn test_cli_version() {
    let mut cmd = pinguard_cli();

    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_check_human() {
    let mut cmd = pinguard_cli();
    cmd.arg("check").arg(fixtures_dir().join("s3_octal.yaml"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ESP32-S3-DevKitC-1"))
        .stdout(predicate::str::contains("DANGER"))
        .stdout(predicate::str::contains("GPIO35"))
        .stdout(predicate::str::contains("Component: status_pwm"));
}

#[test]
fn test_cli_check_fail_on_danger() {
    let mut cmd = pinguard_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("s3_octal.yaml"))
        .arg("--fail-on")
        .arg("danger");

    cmd.assert().failure().code(1);
}

#[test]
fn test_cli_check_fail_on_clean_config() {
    let mut cmd = pinguard_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("dht_nested.yaml"))
        .arg("--fail-on")
        .arg("info");

    cmd.assert().success();
}

#[test]
fn test_cli_check_json() {
    let mut cmd = pinguard_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("ultrasonic.yaml"))
        .arg("--format")
        .arg("json");

    let json = stdout_json(&mut cmd);
    assert_eq!(json["summary"]["totalFiles"], 1);
    assert_eq!(json["summary"]["danger"], 1);
    let findings = json["results"][0]["findings"].as_array().unwrap();
    assert!(findings.iter().all(|f| f["gpio"] == 2));
    assert_eq!(json["results"][0]["config"]["usedPins"]["1"][0]["key"], "echo_pin");
}

#[test]
fn test_cli_check_github_format() {
    let mut cmd = pinguard_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("s3_octal.yaml"))
        .arg("--format")
        .arg("github");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("::error file="))
        .stdout(predicate::str::contains(",line=25::GPIO35"));
}

#[test]
fn test_cli_check_gitlab_format() {
    let mut cmd = pinguard_cli();
    cmd.arg("check")
        .arg(fixtures_dir().join("ultrasonic.yaml"))
        .arg("--format")
        .arg("gitlab");

    let json = stdout_json(&mut cmd);
    let reports = json.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["severity"], "critical");
    assert_eq!(reports[0]["location"]["lines"]["begin"], 9);
    assert_eq!(reports[1]["severity"], "info");
}

#[test]
fn test_cli_check_unknown_layout() {
    let mut cmd = pinguard_cli();
    cmd.arg("check").arg(fixtures_dir().join("unknown_platform.yaml"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("No layout available"))
        .stdout(predicate::str::contains("DANGER").not());
}

#[test]
fn test_cli_check_not_esphome() {
    let mut cmd = pinguard_cli();
    cmd.arg("check").arg(fixtures_dir().join("not_esphome.yaml"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Not an ESPHome config"));
}

#[test]
fn test_cli_check_unresolved_pins_listed() {
    let mut cmd = pinguard_cli();
    cmd.arg("check").arg(fixtures_dir().join("picow_led.yaml"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("UNRESOLVED"))
        .stdout(predicate::str::contains("${missing_pin}"));
}

#[test]
fn test_cli_check_missing_file() {
    let mut cmd = pinguard_cli();
    cmd.arg("check").arg(fixtures_dir().join("missing.yaml"));

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_cli_project() {
    let mut cmd = pinguard_cli();
    cmd.arg("project").arg(fixtures_dir().join("project"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("garage.yaml"))
        .stdout(predicate::str::contains("weather.yml"))
        .stdout(predicate::str::contains("secrets.yaml"))
        .stdout(predicate::str::contains("cached.yaml").not());
}

#[test]
fn test_cli_project_configs_only_with_fail_on() {
    let mut cmd = pinguard_cli();
    cmd.arg("project")
        .arg(fixtures_dir().join("project"))
        .arg("--configs-only")
        .arg("--fail-on")
        .arg("warn");

    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("secrets.yaml").not());
}

#[test]
fn test_cli_boards() {
    let mut cmd = pinguard_cli();
    cmd.arg("boards").arg("--verbose");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("esp32doit-devkit-v1"))
        .stdout(predicate::str::contains("esp32dev -> esp32doit-devkit-v1"))
        .stdout(predicate::str::contains("rpipicow -> rp2040"))
        .stdout(predicate::str::contains("DOIT ESP32 DevKit V1"));
}

#[test]
fn test_cli_pinouts_build_and_check() {
    let dir = tempfile::tempdir().unwrap();

    pinguard_cli()
        .arg("pinouts")
        .arg("build")
        .arg("--out")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    pinguard_cli()
        .arg("pinouts")
        .arg("check")
        .arg("--root")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("is up to date"));

    // Checks run against the freshly built tree.
    pinguard_cli()
        .arg("--pinouts")
        .arg(dir.path())
        .arg("check")
        .arg(fixtures_dir().join("s3_octal.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("GPIO35"));

    let soc = dir.path().join("soc").join("esp32.json");
    let edited = std::fs::read_to_string(&soc)
        .unwrap()
        .replace("Strapping pin", "Strap pin");
    std::fs::write(&soc, edited).unwrap();

    pinguard_cli()
        .arg("pinouts")
        .arg("check")
        .arg("--root")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("drift"));
}

#[test]
fn test_cli_pinouts_check_missing_tree() {
    let dir = tempfile::tempdir().unwrap();

    pinguard_cli()
        .arg("pinouts")
        .arg("check")
        .arg("--root")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("manifest"));
}
