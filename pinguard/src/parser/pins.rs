//! Pin usage scanner.
//!
//! Walks the document once, tracking the current top-level section and the
//! open list item (`- platform: ...`). Every `pin:` or `*_pin:` key is
//! resolved to a GPIO number or recorded as unresolved. After the walk, each
//! usage picks up the `id:` / `name:` of its item, wherever in the item those
//! keys appeared.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::parser::lines::{clean_scalar, strip_inline_comment, Line};
use crate::parser::schema::{ItemContext, PinUsage, UnresolvedPinRef};
use crate::parser::value::{resolve_pin_value, PinResolution, Substitutions};

/// Raw value recorded when a bare `pin:` key has no nested `number:`.
pub const NESTED_PIN_MISSING: &str = "(nested pin with no number found)";

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)-\s+(.*)$").expect("valid regex"))
}

fn platform_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^platform:\s*([^\s#]+)\s*(?:#.*)?$").expect("valid regex"))
}

fn key_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9_]+)\s*:\s*(.*?)\s*$").expect("valid regex"))
}

fn nested_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*number:\s*(.+?)\s*$").expect("valid regex"))
}

pub fn is_pin_key(key: &str) -> bool {
    key == "pin" || key.ends_with("_pin")
}

/// Usages keyed by GPIO plus the references that did not resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinScan {
    pub used_pins: BTreeMap<u32, Vec<PinUsage>>,
    pub unresolved: Vec<UnresolvedPinRef>,
}

/// `id:` or `name:` value with the column it was written at.
#[derive(Debug, Clone)]
struct Labeled {
    column: usize,
    value: String,
}

#[derive(Debug, Clone)]
struct Item {
    section: Option<String>,
    platform: Option<String>,
    id: Option<Labeled>,
    name: Option<Labeled>,
    indent: usize,
}

impl Item {
    fn new(section: Option<String>, platform: Option<String>, indent: usize) -> Self {
        Self {
            section,
            platform,
            id: None,
            name: None,
            indent,
        }
    }

    /// Shallower keys win; at equal depth the first one stays.
    fn label(&mut self, key: &str, column: usize, value: &str) {
        let slot = match key {
            "id" => &mut self.id,
            "name" => &mut self.name,
            _ => return,
        };
        let replace = slot.as_ref().map_or(true, |current| column < current.column);
        if replace && !value.is_empty() {
            *slot = Some(Labeled {
                column,
                value: value.to_string(),
            });
        }
    }

    fn context(&self) -> ItemContext {
        ItemContext {
            section: self.section.clone(),
            platform: self.platform.clone(),
            id: self.id.as_ref().map(|l| l.value.clone()),
            name: self.name.as_ref().map(|l| l.value.clone()),
            item_indent: self.indent,
        }
    }
}

enum Pending {
    Used {
        gpio: u32,
        line: usize,
        key: String,
        section: Option<String>,
        item: Option<usize>,
    },
    Unresolved {
        line: usize,
        key: String,
        raw_value: String,
        item: Option<usize>,
    },
}

/// Content of a line after an optional list marker, with its column.
fn content_of<'a>(line: &Line<'a>) -> (&'a str, usize, Option<usize>) {
    match list_item_re().captures(line.raw) {
        Some(caps) => {
            let marker_indent = caps.get(1).map_or(0, |m| m.as_str().chars().count());
            let rest = caps.get(2).map_or("", |m| m.as_str());
            let start = caps.get(2).map_or(0, |m| m.start());
            let column = line.raw[..start].chars().count();
            (rest.trim_end(), column, Some(marker_indent))
        }
        None => (line.trimmed, line.indent, None),
    }
}

/// First `number:` line nested under the pin key at `index`.
fn find_nested_number<'a>(lines: &[Line<'a>], index: usize, key_column: usize) -> Option<(usize, &'a str)> {
    for line in &lines[index + 1..] {
        if line.is_blank_or_comment() {
            continue;
        }
        if line.indent <= key_column {
            return None;
        }
        if let Some(caps) = nested_number_re().captures(line.raw) {
            let value = caps.get(1).map_or("", |m| m.as_str());
            return Some((line.number, strip_inline_comment(value)));
        }
    }
    None
}

pub fn scan_pin_usages(lines: &[Line<'_>], substitutions: &Substitutions) -> PinScan {
    let mut section: Option<String> = None;
    let mut items: Vec<Item> = Vec::new();
    let mut current: Option<usize> = None;
    let mut pending: Vec<Pending> = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        if line.is_blank_or_comment() {
            continue;
        }

        // Only a bare `key:` header starts a section; `logger: {}` does not.
        if let Some(key) = line.block_header() {
            section = Some(key.to_string());
            current = None;
        }

        let (content, column, marker) = content_of(line);

        let mut opened_here = false;
        if let Some(marker_indent) = marker {
            if let Some(caps) = platform_re().captures(content) {
                items.push(Item::new(
                    section.clone(),
                    Some(clean_scalar(&caps[1]).to_string()),
                    marker_indent,
                ));
                current = Some(items.len() - 1);
                opened_here = true;
            } else if let Some(open) = current.filter(|&i| items[i].indent == marker_indent) {
                let sibling_section = items[open].section.clone();
                items.push(Item::new(sibling_section, None, marker_indent));
                current = Some(items.len() - 1);
                opened_here = true;
            }
        }

        let Some(caps) = key_value_re().captures(content) else {
            continue;
        };
        let key = caps.get(1).map_or("", |m| m.as_str());
        let value = caps.get(2).map_or("", |m| m.as_str());

        if let Some(open) = current {
            if opened_here || line.indent > items[open].indent {
                items[open].label(key, column, clean_scalar(value));
            }
        }

        if !is_pin_key(key) {
            continue;
        }

        let inline = strip_inline_comment(value).trim();
        let (target_line, resolution) = if !inline.is_empty() {
            (line.number, resolve_pin_value(inline, substitutions))
        } else {
            match find_nested_number(lines, index, column) {
                Some((number_line, nested)) => {
                    (number_line, resolve_pin_value(nested, substitutions))
                }
                None => (
                    line.number,
                    PinResolution::Unresolved(NESTED_PIN_MISSING.to_string()),
                ),
            }
        };

        match resolution {
            PinResolution::Gpio(gpio) => pending.push(Pending::Used {
                gpio,
                line: target_line,
                key: key.to_string(),
                section: section.clone(),
                item: current,
            }),
            PinResolution::Unresolved(raw_value) => {
                tracing::debug!(line = target_line, %key, %raw_value, "unresolved pin reference");
                pending.push(Pending::Unresolved {
                    line: target_line,
                    key: key.to_string(),
                    raw_value,
                    item: current,
                });
            }
        }
    }

    let mut scan = PinScan::default();
    for entry in pending {
        match entry {
            Pending::Used {
                gpio,
                line,
                key,
                section,
                item,
            } => {
                let ctx = item.map(|i| items[i].context());
                let usage = PinUsage {
                    gpio,
                    line,
                    key,
                    section: ctx.as_ref().map_or(section, |c| c.section.clone()),
                    platform: ctx.as_ref().and_then(|c| c.platform.clone()),
                    id: ctx.as_ref().and_then(|c| c.id.clone()),
                    name: ctx.and_then(|c| c.name),
                };
                scan.used_pins.entry(gpio).or_default().push(usage);
            }
            Pending::Unresolved {
                line,
                key,
                raw_value,
                item,
            } => scan.unresolved.push(UnresolvedPinRef {
                line,
                key,
                raw_value,
                context: item.map(|i| items[i].context()),
            }),
        }
    }

    for bucket in scan.used_pins.values_mut() {
        bucket.sort_by_key(|u| u.line);
    }

    tracing::debug!(
        pins = scan.used_pins.len(),
        unresolved = scan.unresolved.len(),
        "scanned pin usages"
    );
    scan
}
