//! Line tokenizer and indent model.
//!
//! Every scanner in this crate works on [`Line`]s rather than on a YAML tree.
//! Indentation is the count of leading whitespace characters; tabs are not
//! expanded, so a tab and a space both count as one column.

use regex::Regex;
use std::sync::OnceLock;

/// One physical line of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// 1-based line number.
    pub number: usize,
    /// The line exactly as written, without its terminator.
    pub raw: &'a str,
    /// Leading whitespace character count.
    pub indent: usize,
    /// The line with surrounding whitespace removed.
    pub trimmed: &'a str,
}

impl<'a> Line<'a> {
    pub fn new(number: usize, raw: &'a str) -> Self {
        Self {
            number,
            raw,
            indent: count_indent(raw),
            trimmed: raw.trim(),
        }
    }

    /// Blank lines and full-line comments are invisible to every scanner.
    pub fn is_blank_or_comment(&self) -> bool {
        self.trimmed.is_empty() || self.trimmed.starts_with('#')
    }

    pub fn is_top_level(&self) -> bool {
        self.indent == 0
    }

    /// `true` for a zero-indent `key:` line, with or without an inline value.
    pub fn is_top_level_key(&self) -> bool {
        self.top_level_key().is_some()
    }

    /// Key name of a zero-indent `key:` line.
    pub fn top_level_key(&self) -> Option<&'a str> {
        if !self.is_top_level() {
            return None;
        }
        top_level_key_re()
            .captures(self.trimmed)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    /// Name of a zero-indent block header (`key:` with nothing after the colon).
    pub fn block_header(&self) -> Option<&'a str> {
        if !self.is_top_level() {
            return None;
        }
        block_header_re()
            .captures(self.raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

fn top_level_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9_]+)\s*:").expect("valid regex"))
}

fn block_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9_]+)\s*:\s*$").expect("valid regex"))
}

/// Split text on `\r\n`, `\n`, or a lone `\r`.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                out.push(&text[start..i]);
                start = i + 1;
            }
            b'\r' => {
                out.push(&text[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    out.push(&text[start..]);
    out
}

/// Tokenize text into numbered lines.
pub fn tokenize(text: &str) -> Vec<Line<'_>> {
    split_lines(text)
        .into_iter()
        .enumerate()
        .map(|(idx, raw)| Line::new(idx + 1, raw))
        .collect()
}

pub fn count_indent(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Remove one matching pair of surrounding `"` or `'`. No escape handling.
pub fn strip_quotes(value: &str) -> &str {
    let t = value.trim();
    if t.len() >= 2 {
        let first = t.as_bytes()[0];
        let last = t.as_bytes()[t.len() - 1];
        if (first == b'"' || first == b'\'') && first == last {
            return &t[1..t.len() - 1];
        }
    }
    t
}

/// Cut a trailing `# comment` that sits outside any quoted region.
///
/// A `#` only starts a comment at the beginning of the value or after
/// whitespace, so tokens like `abc#def` survive. Quotes only count when the
/// value itself opens with one.
pub fn strip_inline_comment(value: &str) -> &str {
    let body = value.trim_start();
    let lead = value.len() - body.len();

    let scan_from = match body.chars().next() {
        Some(q @ ('"' | '\'')) => match body[1..].find(q) {
            Some(close) => lead + close + 2,
            None => return value.trim_end(),
        },
        _ => lead,
    };

    let mut prev_ws = scan_from == lead;
    for (idx, ch) in value[scan_from..].char_indices() {
        if ch == '#' && prev_ws {
            return value[..scan_from + idx].trim_end();
        }
        prev_ws = ch.is_whitespace();
    }

    value.trim_end()
}

/// Clean a captured scalar: drop trailing comment, then outer quotes.
pub fn clean_scalar(value: &str) -> &str {
    strip_quotes(strip_inline_comment(value.trim()))
}

/// Lines belonging to the zero-indent block `name:`.
///
/// Collection starts after the first matching header and stops at the next
/// zero-indent key. Blank and comment lines are skipped. Returns `None` when
/// the header does not exist.
pub fn block_body<'a, 'b>(lines: &'b [Line<'a>], name: &str) -> Option<Vec<&'b Line<'a>>> {
    let start = lines
        .iter()
        .position(|l| l.is_top_level() && l.trimmed.strip_suffix(':') == Some(name))?;

    let body = lines[start + 1..]
        .iter()
        .filter(|l| !l.is_blank_or_comment())
        .take_while(|l| !l.is_top_level_key())
        .filter(|l| l.indent > 0)
        .collect();

    Some(body)
}
