//! Pinout knowledge base data shapes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const INDEX_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Danger,
}

impl Severity {
    pub fn rank(self) -> u8 {
        match self {
            Severity::Info => 1,
            Severity::Warn => 2,
            Severity::Danger => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Danger => "danger",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive `[low, high]` GPIO range.
pub type GpioRange = [u32; 2];

fn in_range(gpio: u32, range: &GpioRange) -> bool {
    gpio >= range[0] && gpio <= range[1]
}

/// Extra condition on a rule, evaluated against the config's PSRAM mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psram_mode_includes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psram_mode_excludes: Option<String>,
}

impl RuleCondition {
    /// Case-insensitive substring test; a missing mode counts as empty.
    pub fn holds(&self, psram_mode: Option<&str>) -> bool {
        let mode = psram_mode.unwrap_or("").to_lowercase();
        if let Some(needle) = &self.psram_mode_includes {
            if !mode.contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if let Some(needle) = &self.psram_mode_excludes {
            if mode.contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// A hazard attached to a set of GPIOs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinRule {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpios: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpio_range: Option<GpioRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpio_ranges: Vec<GpioRange>,
    pub severity: Severity,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<RuleCondition>,
}

impl PinRule {
    pub fn matches_gpio(&self, gpio: u32) -> bool {
        self.gpios.contains(&gpio)
            || self.gpio_range.as_ref().is_some_and(|r| in_range(gpio, r))
            || self.gpio_ranges.iter().any(|r| in_range(gpio, r))
    }

    pub fn applies(&self, gpio: u32, psram_mode: Option<&str>) -> bool {
        self.matches_gpio(gpio) && self.when.as_ref().map_or(true, |w| w.holds(psram_mode))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinType {
    Gpio,
    Power,
    Ground,
    Reset,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderSide {
    Left,
    Right,
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderPin {
    pub label: String,
    pub gpio: Option<u32>,
    #[serde(rename = "type")]
    pub pin_type: PinType,
    /// 1-based position along the header.
    pub header_no: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub name: String,
    pub side: HeaderSide,
    pub pins: Vec<HeaderPin>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeMm {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvgPin {
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub target_raw: String,
    pub gpio: Option<u32>,
    #[serde(rename = "type")]
    pub pin_type: PinType,
}

/// Dev board drawn as one or more pin headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderBoard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soc_ref: Option<String>,
    pub headers: Vec<Header>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pin_issues: Vec<PinRule>,
}

/// Bare chip: every GPIO the silicon exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocGrid {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soc_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub gpios: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pin_issues: Vec<PinRule>,
}

/// Board with a drawing and pin coordinates in millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvgBoard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soc_ref: Option<String>,
    pub svg_path: String,
    pub size_mm: SizeMm,
    pub pins: Vec<SvgPin>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pin_issues: Vec<PinRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnknownBoard {
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BoardDefinition {
    HeaderBoard(HeaderBoard),
    SocGrid(SocGrid),
    SvgBoard(SvgBoard),
    Unknown(UnknownBoard),
}

impl BoardDefinition {
    pub fn unknown(board: Option<&str>) -> Self {
        let display_name = match board {
            Some(id) if !id.is_empty() => format!("Unknown board: {}", id),
            _ => "Unknown board".to_string(),
        };
        BoardDefinition::Unknown(UnknownBoard { display_name })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BoardDefinition::HeaderBoard(_) => "header-board",
            BoardDefinition::SocGrid(_) => "soc-grid",
            BoardDefinition::SvgBoard(_) => "svg-board",
            BoardDefinition::Unknown(_) => "unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, BoardDefinition::Unknown(_))
    }

    pub fn display_name(&self) -> &str {
        match self {
            BoardDefinition::HeaderBoard(b) => &b.display_name,
            BoardDefinition::SocGrid(b) => &b.display_name,
            BoardDefinition::SvgBoard(b) => &b.display_name,
            BoardDefinition::Unknown(b) => &b.display_name,
        }
    }

    pub fn pin_issues(&self) -> &[PinRule] {
        match self {
            BoardDefinition::HeaderBoard(b) => &b.pin_issues,
            BoardDefinition::SocGrid(b) => &b.pin_issues,
            BoardDefinition::SvgBoard(b) => &b.pin_issues,
            BoardDefinition::Unknown(_) => &[],
        }
    }

    /// GPIOs physically reachable on this layout. Empty means "no data".
    pub fn available_gpios(&self) -> BTreeSet<u32> {
        match self {
            BoardDefinition::HeaderBoard(b) => b
                .headers
                .iter()
                .flat_map(|h| h.pins.iter())
                .filter_map(|p| p.gpio)
                .collect(),
            BoardDefinition::SocGrid(b) => b.gpios.iter().copied().collect(),
            BoardDefinition::SvgBoard(b) => b.pins.iter().filter_map(|p| p.gpio).collect(),
            BoardDefinition::Unknown(_) => BTreeSet::new(),
        }
    }
}

/// SoC grid standing in for a board that has no drawing of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSocAlias {
    pub soc: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pin_issues: Vec<PinRule>,
}

/// `index.json`: the entry point of a pinout tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinoutIndex {
    pub schema_version: u32,
    /// Board id to definition path, relative to the tree root.
    #[serde(default)]
    pub boards: BTreeMap<String, String>,
    /// SoC id to definition path.
    #[serde(default)]
    pub soc: BTreeMap<String, String>,
    /// Alternate spelling to canonical board id.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub board_soc_aliases: BTreeMap<String, BoardSocAlias>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(json: &str) -> PinRule {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Danger > Severity::Warn);
        assert!(Severity::Warn > Severity::Info);
        assert_eq!(
            [Severity::Info, Severity::Danger, Severity::Warn].iter().max(),
            Some(&Severity::Danger)
        );
        assert_eq!(Severity::Danger.rank(), 3);
    }

    #[test]
    fn test_rule_matching_is_a_union() {
        let r = rule(r#"{"gpios":[0,2],"gpioRange":[6,11],"gpioRanges":[[16,17],[34,39]],"severity":"warn","text":"t"}"#);
        for gpio in [0, 2, 6, 11, 16, 17, 34, 39] {
            assert!(r.matches_gpio(gpio), "gpio {}", gpio);
        }
        for gpio in [1, 5, 12, 18, 33, 40] {
            assert!(!r.matches_gpio(gpio), "gpio {}", gpio);
        }
    }

    #[test]
    fn test_condition_gating() {
        let octal = rule(r#"{"gpioRange":[33,37],"severity":"danger","text":"t","when":{"psramModeIncludes":"Octal"}}"#);
        assert!(octal.applies(35, Some("octal")));
        assert!(!octal.applies(35, Some("quad")));
        assert!(!octal.applies(35, None));

        let not_octal = rule(r#"{"gpioRange":[33,37],"severity":"warn","text":"t","when":{"psramModeExcludes":"octal"}}"#);
        assert!(not_octal.applies(35, None));
        assert!(not_octal.applies(35, Some("quad")));
        assert!(!not_octal.applies(35, Some("OCTAL")));
    }

    #[test]
    fn test_kind_tag() {
        let def: BoardDefinition = serde_json::from_str(
            r#"{"kind":"soc-grid","displayName":"ESP32","gpios":[1,2,3]}"#,
        )
        .unwrap();
        assert_eq!(def.kind(), "soc-grid");
        assert_eq!(def.available_gpios().len(), 3);
        assert!(def.pin_issues().is_empty());
    }

    #[test]
    fn test_unknown_placeholder() {
        let def = BoardDefinition::unknown(Some("my-board"));
        assert_eq!(def.display_name(), "Unknown board: my-board");
        assert!(def.available_gpios().is_empty());
        assert_eq!(BoardDefinition::unknown(None).display_name(), "Unknown board");
    }
}
