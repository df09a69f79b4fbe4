use crate::parser::board::extract_board_identity;
use crate::parser::lines::tokenize;
use crate::parser::pins::scan_pin_usages;
use crate::parser::schema::ParsedConfig;
use crate::parser::substitutions::extract_substitutions;

/// Markers whose presence anywhere in the text marks an ESPHome document.
pub const DIALECT_MARKERS: &[&str] = &[
    "esphome:", "esp32:", "esp8266:", "rp2040:", "bk72xx:", "rtl87xx:",
];

pub const NOT_A_CONFIG_REASON: &str = "YAML does not look like an ESPHome config (heuristic).";

/// Cheap content check; a plain substring test, comments included.
pub fn looks_like_config(text: &str) -> bool {
    DIALECT_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Scan `text` for board identity, substitutions and pin usages.
///
/// Never fails: text that is not an ESPHome config yields a rejected
/// [`ParsedConfig`] with a reason.
pub fn parse_config(text: &str) -> ParsedConfig {
    if !looks_like_config(text) {
        tracing::debug!("text rejected by dialect check");
        return ParsedConfig::rejected(NOT_A_CONFIG_REASON);
    }

    let lines = tokenize(text);
    let identity = extract_board_identity(&lines);
    let substitutions = extract_substitutions(&lines);
    let scan = scan_pin_usages(&lines, &substitutions);

    ParsedConfig {
        ok: true,
        reason: None,
        board: identity.board,
        variant: identity.variant,
        psram_mode: identity.psram_mode,
        platform: identity.platform,
        substitutions,
        used_pins: scan.used_pins,
        unresolved: scan.unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_check() {
        assert!(looks_like_config("esphome:\n  name: x\n"));
        assert!(looks_like_config("# esp8266: mentioned in a comment\n"));
        assert!(!looks_like_config("version: '3'\nservices:\n  web: {}\n"));
    }

    #[test]
    fn test_rejected_text() {
        let parsed = parse_config("foo: bar\n");
        assert!(!parsed.ok);
        assert_eq!(parsed.reason.as_deref(), Some(NOT_A_CONFIG_REASON));
        assert_eq!(parsed.board, None);
    }

    #[test]
    fn test_empty_text_is_rejected() {
        assert!(!parse_config("").ok);
    }

    #[test]
    fn test_minimal_config() {
        let parsed = parse_config("esphome:\n  name: x\n");
        assert!(parsed.ok);
        assert_eq!(parsed.reason, None);
        assert!(parsed.used_pins.is_empty());
        assert!(parsed.unresolved.is_empty());
    }
}
