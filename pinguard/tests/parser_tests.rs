//! Parser tests against realistic ESPHome configs

use pinguard::parser::{parse_config, NESTED_PIN_MISSING, NOT_A_CONFIG_REASON};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("Failed to read fixture")
}

#[test]
fn test_s3_board_identity_and_substituted_pin() {
    let parsed = parse_config(&read_fixture("s3_octal.yaml"));

    assert!(parsed.ok);
    assert_eq!(parsed.board.as_deref(), Some("esp32-s3-devkitc-1"));
    assert_eq!(parsed.variant.as_deref(), Some("esp32s3"));
    assert_eq!(parsed.psram_mode.as_deref(), Some("octal"));
    assert_eq!(parsed.platform.as_deref(), Some("esp32"));
    assert_eq!(parsed.substitutions.get("led_pin").map(String::as_str), Some("GPIO4"));

    let usages = parsed.usages(4);
    let usage = usages
        .iter()
        .find(|u| u.key == "pin")
        .expect("GPIO4 should be used by a pin key");
    assert_eq!(usage.line, 20);
    assert_eq!(usage.section.as_deref(), Some("binary_sensor"));
    assert_eq!(usage.platform.as_deref(), Some("gpio"));
    assert_eq!(usage.name.as_deref(), Some("Btn"));
    assert_eq!(usage.id, None);

    // The substitution definition itself is recorded as well.
    let definition = usages
        .iter()
        .find(|u| u.key == "led_pin")
        .expect("substitution line should be a usage");
    assert_eq!(definition.line, 2);
    assert_eq!(definition.section.as_deref(), Some("substitutions"));
}

#[test]
fn test_s3_second_section_is_separate_item() {
    let parsed = parse_config(&read_fixture("s3_octal.yaml"));

    let usage = &parsed.usages(35)[0];
    assert_eq!(usage.line, 25);
    assert_eq!(usage.section.as_deref(), Some("output"));
    assert_eq!(usage.platform.as_deref(), Some("ledc"));
    assert_eq!(usage.id.as_deref(), Some("status_pwm"));
    assert_eq!(usage.name, None);
    assert_eq!(parsed.used_pins.keys().copied().collect::<Vec<_>>(), vec![4, 35]);
    assert!(parsed.unresolved.is_empty());
}

#[test]
fn test_nested_dht_pin_reports_number_line() {
    let parsed = parse_config(&read_fixture("dht_nested.yaml"));

    assert!(parsed.ok);
    assert_eq!(parsed.board.as_deref(), Some("d1_mini"));
    assert_eq!(parsed.platform.as_deref(), Some("esp8266"));

    let usage = &parsed.usages(14)[0];
    assert_eq!(usage.key, "pin");
    assert_eq!(usage.line, 8, "Line should point at the nested number");
    assert_eq!(usage.platform.as_deref(), Some("dht"));
    // Item-level name beats the deeper sensor names.
    assert_eq!(usage.name.as_deref(), Some("DHT"));
    assert_eq!(parsed.total_usages(), 1);
}

#[test]
fn test_inline_mapping_pin() {
    let text = "esphome:\n  name: x\nsensor:\n  - platform: dht\n    pin: {number: GPIO14, mode: INPUT}\n    name: \"DHT\"\n";
    let parsed = parse_config(text);
    let usage = &parsed.usages(14)[0];
    assert_eq!(usage.key, "pin");
    assert_eq!(usage.line, 5);
    assert_eq!(usage.name.as_deref(), Some("DHT"));
}

#[test]
fn test_ultrasonic_pins_share_id_and_name() {
    let parsed = parse_config(&read_fixture("ultrasonic.yaml"));

    let trigger = &parsed.usages(2)[0];
    let echo = &parsed.usages(1)[0];

    assert_eq!(trigger.key, "trigger_pin");
    assert_eq!(echo.key, "echo_pin");
    assert_eq!(trigger.line, 9);
    assert_eq!(echo.line, 11);

    for usage in [trigger, echo] {
        assert_eq!(usage.id.as_deref(), Some("parking_distance"));
        assert_eq!(usage.name.as_deref(), Some("Parking Distance Ultrasonic Sensor"));
        assert_eq!(usage.platform.as_deref(), Some("ultrasonic"));
        assert_eq!(usage.section.as_deref(), Some("sensor"));
    }
}

#[test]
fn test_non_esphome_document_is_rejected() {
    let parsed = parse_config(&read_fixture("not_esphome.yaml"));
    assert!(!parsed.ok);
    assert_eq!(parsed.reason.as_deref(), Some(NOT_A_CONFIG_REASON));
    assert!(parsed.used_pins.is_empty());
    assert_eq!(parsed.board, None);
}

#[test]
fn test_bank_notation() {
    let parsed = parse_config(&read_fixture("xiao_ble.yaml"));
    assert_eq!(parsed.platform.as_deref(), Some("nrf52"));
    assert_eq!(parsed.board.as_deref(), Some("xiao_ble"));
    assert_eq!(parsed.usages(43)[0].name.as_deref(), Some("Button"));
    assert_eq!(parsed.usages(26)[0].name.as_deref(), Some("Door"));
}

#[test]
fn test_undefined_substitution_is_unresolved() {
    let parsed = parse_config(&read_fixture("picow_led.yaml"));

    assert_eq!(parsed.usages(25).len(), 1);
    assert_eq!(parsed.unresolved.len(), 1);
    let unresolved = &parsed.unresolved[0];
    assert_eq!(unresolved.line, 11);
    assert_eq!(unresolved.key, "pin");
    assert_eq!(unresolved.raw_value, "${missing_pin}");
    let context = unresolved.context.as_ref().expect("Unresolved ref should keep its item");
    assert_eq!(context.id.as_deref(), Some("spare"));
    assert_eq!(context.platform.as_deref(), Some("gpio"));
}

#[test]
fn test_bare_pin_without_number_is_unresolved() {
    let text = "esphome:\n  name: x\nswitch:\n  - platform: gpio\n    pin:\n      inverted: true\n    name: Relay\n";
    let parsed = parse_config(text);
    assert!(parsed.used_pins.is_empty());
    assert_eq!(parsed.unresolved.len(), 1);
    assert_eq!(parsed.unresolved[0].raw_value, NESTED_PIN_MISSING);
    assert_eq!(parsed.unresolved[0].line, 5);
}

#[test]
fn test_same_gpio_twice_is_sorted_by_line() {
    let text = "\
esphome:
  name: x
switch:
  - platform: gpio
    pin: GPIO5
    name: Late
binary_sensor:
  - platform: gpio
    pin: 5
    name: Also
";
    let parsed = parse_config(text);
    let lines: Vec<usize> = parsed.usages(5).iter().map(|u| u.line).collect();
    assert_eq!(lines, vec![5, 9]);
    assert_eq!(parsed.usages(5)[1].section.as_deref(), Some("binary_sensor"));
}

#[test]
fn test_crlf_and_comments() {
    let text = "esphome:\r\n  name: x\r\n# relay\r\nswitch:\r\n  - platform: gpio  # the relay\r\n    pin: GPIO12  # boot strap!\r\n";
    let parsed = parse_config(text);
    assert!(parsed.ok);
    let usage = &parsed.usages(12)[0];
    assert_eq!(usage.line, 6);
    assert_eq!(usage.platform.as_deref(), Some("gpio"));
}

#[test]
fn test_parse_is_idempotent_on_fixtures() {
    for name in ["s3_octal.yaml", "dht_nested.yaml", "ultrasonic.yaml", "picow_led.yaml"] {
        let text = read_fixture(name);
        assert_eq!(parse_config(&text), parse_config(&text), "{} parsed differently", name);
    }
}

#[test]
fn test_parsed_config_serializes_camel_case() {
    let parsed = parse_config(&read_fixture("s3_octal.yaml"));
    let json = serde_json::to_value(&parsed).unwrap();
    assert_eq!(json["psramMode"], "octal");
    assert_eq!(json["usedPins"]["4"][0]["name"], "Btn");
    assert!(json.get("reason").is_none());
}
