//! Integration tests for the PinGuard check pipeline

use pinguard::prelude::*;
use pinguard::pinouts::{EmbeddedSource, PinoutSourceConfig};
use pinguard::CheckStats;
use std::path::PathBuf;
use std::sync::Arc;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn embedded_options() -> CheckOptions {
    CheckOptions {
        pinouts: PinoutSourceConfig::Embedded,
        configs_only: false,
    }
}

fn resolver() -> PinoutResolver {
    PinoutResolver::new(Arc::new(EmbeddedSource::builtin().unwrap()))
}

#[tokio::test]
async fn test_octal_psram_flags_gpio35_as_danger() {
    let result = PinGuardCore::check_file(&fixture_path("s3_octal.yaml"), embedded_options())
        .await
        .expect("Check should succeed");

    assert!(result.is_config());
    let layout = result.layout.as_ref().expect("Config should have a layout");
    assert_eq!(layout.kind, "soc-grid");
    assert_eq!(layout.display_name, "ESP32-S3-DevKitC-1");

    assert_eq!(result.findings.len(), 1, "Findings: {:?}", result.findings);
    let finding = &result.findings[0];
    assert_eq!(finding.gpio, 35);
    assert_eq!(finding.severity, Severity::Danger);
    assert_eq!(finding.rule_id, "pin-rule");
    assert!(finding.message.starts_with("GPIO35: Octal flash/PSRAM"));
    assert_eq!(finding.line, Some(25));
    assert_eq!(finding.component.as_deref(), Some("status_pwm"));

    assert_eq!(result.stats.danger, 1);
    assert_eq!(result.stats.warn, 0);
    assert_eq!(result.worst_severity(), Some(Severity::Danger));
}

#[tokio::test]
async fn test_without_octal_psram_gpio35_is_only_a_warning() {
    let text = std::fs::read_to_string(fixture_path("s3_octal.yaml"))
        .unwrap()
        .replace("mode: octal", "mode: quad");

    let result = PinGuardCore::check_text(&text, "quad.yaml", &resolver()).await;

    assert_eq!(result.config.psram_mode.as_deref(), Some("quad"));
    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].severity, Severity::Warn);
    assert!(result.has_findings_at_or_above(Severity::Warn));
    assert!(!result.has_findings_at_or_above(Severity::Danger));
}

#[tokio::test]
async fn test_strapping_pin_on_aliased_board() {
    let result = PinGuardCore::check_file(&fixture_path("ultrasonic.yaml"), embedded_options())
        .await
        .unwrap();

    assert_eq!(
        result.layout.as_ref().map(|l| l.display_name.as_str()),
        Some("DOIT ESP32 DevKit V1")
    );

    let gpio2: Vec<&Finding> = result.findings.iter().filter(|f| f.gpio == 2).collect();
    assert_eq!(gpio2.len(), 2);
    // Family rules come before the board's own rules.
    assert_eq!(gpio2[0].severity, Severity::Danger);
    assert_eq!(gpio2[1].severity, Severity::Info);
    assert_eq!(
        gpio2[0].component.as_deref(),
        Some("Parking Distance Ultrasonic Sensor (id: parking_distance)")
    );

    assert!(result.findings.iter().all(|f| f.gpio != 1));
    assert_eq!(result.stats.danger, 1);
    assert_eq!(result.stats.info, 1);
}

#[tokio::test]
async fn test_platform_fallback_flags_missing_gpio() {
    let result = PinGuardCore::check_file(&fixture_path("custom_board.yaml"), embedded_options())
        .await
        .unwrap();

    assert_eq!(
        result.layout.as_ref().map(|l| l.display_name.as_str()),
        Some("ESP32 (SoC pin grid)")
    );
    assert_eq!(result.findings.len(), 1);
    let finding = &result.findings[0];
    assert_eq!(finding.gpio, 20);
    assert_eq!(finding.rule_id, "pin-not-present");
    assert_eq!(finding.severity, Severity::Danger);
    assert_eq!(finding.component.as_deref(), Some("Relay"));
}

#[tokio::test]
async fn test_unknown_layout_reports_nothing() {
    let result = PinGuardCore::check_file(&fixture_path("unknown_platform.yaml"), embedded_options())
        .await
        .unwrap();

    assert!(result.is_config());
    let layout = result.layout.as_ref().unwrap();
    assert_eq!(layout.kind, "unknown");
    assert_eq!(layout.display_name, "Unknown board: generic-bk7231n");
    assert!(result.findings.is_empty());
    assert!(result.config.is_used(99));
}

#[tokio::test]
async fn test_pico_w_wireless_pin_and_unresolved_ref() {
    let result = PinGuardCore::check_file(&fixture_path("picow_led.yaml"), embedded_options())
        .await
        .unwrap();

    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].gpio, 25);
    assert!(result.findings[0].message.contains("CYW43"));
    assert_eq!(result.stats.unresolved, 1);
}

#[tokio::test]
async fn test_bank_pins_are_available_on_nrf52840() {
    let result = PinGuardCore::check_file(&fixture_path("xiao_ble.yaml"), embedded_options())
        .await
        .unwrap();

    assert_eq!(
        result.layout.as_ref().map(|l| l.display_name.as_str()),
        Some("Seeed Studio XIAO nRF52840")
    );
    assert!(result.findings.is_empty());
}

#[tokio::test]
async fn test_non_config_file_is_skipped() {
    let result = PinGuardCore::check_file(&fixture_path("not_esphome.yaml"), embedded_options())
        .await
        .unwrap();

    assert!(!result.is_config());
    assert!(result.layout.is_none());
    assert!(result.findings.is_empty());
    assert_eq!(result.stats, CheckStats::default());
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let err = PinGuardCore::check_file(&fixture_path("does_not_exist.yaml"), embedded_options())
        .await
        .unwrap_err();
    assert!(matches!(err, PinGuardError::Io(_)));
}

#[tokio::test]
async fn test_check_project() {
    let results = PinGuardCore::check_project(&fixture_path("project"), embedded_options())
        .await
        .expect("Project check should succeed");

    let names: Vec<String> = results
        .iter()
        .map(|r| {
            PathBuf::from(&r.file)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    // Sorted by path; .esphome is never descended into.
    assert_eq!(names, vec!["weather.yml", "garage.yaml", "secrets.yaml"]);

    let secrets = &results[2];
    assert!(!secrets.is_config());

    let total: usize = results.iter().map(|r| r.total_findings()).sum();
    assert_eq!(total, 2);
}

#[tokio::test]
async fn test_check_project_configs_only() {
    let options = CheckOptions {
        pinouts: PinoutSourceConfig::Embedded,
        configs_only: true,
    };
    let results = PinGuardCore::check_project(&fixture_path("project"), options)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_config()));
}

#[tokio::test]
async fn test_check_project_rejects_file() {
    let err = PinGuardCore::check_project(&fixture_path("ultrasonic.yaml"), embedded_options())
        .await
        .unwrap_err();
    assert!(matches!(err, PinGuardError::Other(_)));
}

#[tokio::test]
async fn test_result_json_shape() {
    let result = PinGuardCore::check_file(&fixture_path("s3_octal.yaml"), embedded_options())
        .await
        .unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["layout"]["kind"], "soc-grid");
    assert_eq!(json["findings"][0]["ruleId"], "pin-rule");
    assert_eq!(json["findings"][0]["severity"], "danger");
    assert_eq!(json["config"]["board"], "esp32-s3-devkitc-1");
    assert_eq!(json["stats"]["danger"], 1);
}
