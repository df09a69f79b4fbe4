use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::parser::value::Substitutions;

/// Result of scanning one config document.
///
/// When `ok` is false the document was not recognized as an ESPHome config;
/// `reason` says why and every collection is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedConfig {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub board: Option<String>,
    pub variant: Option<String>,
    pub psram_mode: Option<String>,
    /// Silicon block (`esp32`, `esp8266`, ...) the board identity came from.
    pub platform: Option<String>,
    pub substitutions: Substitutions,
    /// GPIO number to its usages, each list ascending by line.
    pub used_pins: BTreeMap<u32, Vec<PinUsage>>,
    pub unresolved: Vec<UnresolvedPinRef>,
}

impl ParsedConfig {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
            board: None,
            variant: None,
            psram_mode: None,
            platform: None,
            substitutions: Substitutions::new(),
            used_pins: BTreeMap::new(),
            unresolved: Vec::new(),
        }
    }

    pub fn usages(&self, gpio: u32) -> &[PinUsage] {
        self.used_pins.get(&gpio).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_usages(&self) -> usize {
        self.used_pins.values().map(Vec::len).sum()
    }

    pub fn is_used(&self, gpio: u32) -> bool {
        self.used_pins.contains_key(&gpio)
    }
}

/// One resolved pin reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinUsage {
    pub gpio: u32,
    /// 1-based line of the numeric token (the `number:` line for nested pins).
    pub line: usize,
    /// Key that declared the pin, e.g. `pin` or `trigger_pin`.
    pub key: String,
    pub section: Option<String>,
    pub platform: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
}

impl PinUsage {
    /// `section / platform (id: x, name: y)`, or `component` when nothing is known.
    pub fn label(&self) -> String {
        let head: Vec<&str> = [self.section.as_deref(), self.platform.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        let head = if head.is_empty() {
            "component".to_string()
        } else {
            head.join(" / ")
        };

        let meta: Vec<String> = [
            self.id.as_ref().map(|id| format!("id: {}", id)),
            self.name.as_ref().map(|name| format!("name: {}", name)),
        ]
        .into_iter()
        .flatten()
        .collect();

        if meta.is_empty() {
            head
        } else {
            format!("{} ({})", head, meta.join(", "))
        }
    }
}

/// A pin-bearing key whose value could not be reduced to a GPIO number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedPinRef {
    pub line: usize,
    pub key: String,
    pub raw_value: String,
    pub context: Option<ItemContext>,
}

/// Snapshot of the list item enclosing a pin declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemContext {
    pub section: Option<String>,
    pub platform: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub item_indent: usize,
}
