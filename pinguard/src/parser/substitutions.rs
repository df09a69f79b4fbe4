//! `substitutions:` block extraction.

use regex::Regex;
use std::sync::OnceLock;

use crate::parser::lines::{block_body, clean_scalar, Line};
use crate::parser::value::Substitutions;

pub const SUBSTITUTIONS_BLOCK: &str = "substitutions";

fn entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([A-Za-z0-9_]+)\s*:\s*(.+?)\s*$").expect("valid regex"))
}

/// Collect `name: value` pairs from the top-level `substitutions:` block.
///
/// Values are stored as written (quotes and trailing comments removed).
/// Pin resolution happens later, where the value is used.
pub fn extract_substitutions(lines: &[Line<'_>]) -> Substitutions {
    let mut table = Substitutions::new();

    let Some(body) = block_body(lines, SUBSTITUTIONS_BLOCK) else {
        return table;
    };

    for line in body {
        if let Some(caps) = entry_re().captures(line.raw) {
            let value = clean_scalar(&caps[2]);
            table.insert(caps[1].to_string(), value.to_string());
        }
    }

    tracing::debug!(count = table.len(), "extracted substitutions");
    table
}
