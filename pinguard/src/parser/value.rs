//! Pin value resolution.
//!
//! Firmware configs spell the same pin many ways: `4`, `GPIO4`, `"GPIO4"`,
//! `${status_pin}`, `{number: GPIO4, inverted: true}`, or `P1.11` on nRF52
//! parts. [`resolve_pin_value`] tries each spelling in a fixed order and
//! stops at the first one that matches.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::parser::lines::strip_quotes;

/// Flat `name -> raw value` table from the `substitutions:` block.
pub type Substitutions = BTreeMap<String, String>;

/// Outcome of resolving one pin value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinResolution {
    Gpio(u32),
    /// Nothing matched. Holds the text after quote stripping and substitution.
    Unresolved(String),
}

impl PinResolution {
    pub fn gpio(&self) -> Option<u32> {
        match self {
            PinResolution::Gpio(n) => Some(*n),
            PinResolution::Unresolved(_) => None,
        }
    }
}

fn template_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$\{([A-Za-z0-9_]+)\}$").expect("valid regex"))
}

fn template_any_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").expect("valid regex"))
}

fn inline_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)number\s*:\s*(?:"(?:GPIO)?\s*(\d+)"|'(?:GPIO)?\s*(\d+)'|(?:GPIO)?\s*(\d+))"#,
        )
        .expect("valid regex")
    })
}

fn exact_gpio_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:GPIO)?\s*(\d+)\s*$").expect("valid regex"))
}

fn bank_pin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^P([01])\.(\d+)$").expect("valid regex"))
}

fn loose_gpio_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:GPIO)?\s*(\d+)").expect("valid regex"))
}

fn first_number(caps: &regex::Captures<'_>) -> Option<u32> {
    caps.iter()
        .skip(1)
        .flatten()
        .next()
        .and_then(|m| m.as_str().parse().ok())
}

/// Resolve a raw scalar to a GPIO number.
pub fn resolve_pin_value(raw: &str, substitutions: &Substitutions) -> PinResolution {
    let mut value = strip_quotes(raw.trim()).trim().to_string();

    let referenced = template_ref_re()
        .captures(&value)
        .map(|caps| caps[1].to_string());
    if let Some(name) = referenced {
        if let Some(replacement) = substitutions.get(&name) {
            tracing::trace!(%name, %replacement, "substituted pin value");
            value = replacement.trim().to_string();
        }
    }

    if value.starts_with('{') && value.contains("number") {
        if let Some(gpio) = inline_number_re()
            .captures(&value)
            .and_then(|c| first_number(&c))
        {
            return PinResolution::Gpio(gpio);
        }
    }

    if let Some(gpio) = exact_gpio_re()
        .captures(&value)
        .and_then(|c| first_number(&c))
    {
        return PinResolution::Gpio(gpio);
    }

    if let Some(caps) = bank_pin_re().captures(&value) {
        let bank: Option<u32> = caps[1].parse().ok();
        let pin: Option<u32> = caps[2].parse().ok();
        if let Some(gpio) = bank.zip(pin).and_then(|(b, p)| (b * 32).checked_add(p)) {
            return PinResolution::Gpio(gpio);
        }
    }

    if let Some(gpio) = loose_gpio_re()
        .captures(&value)
        .and_then(|c| first_number(&c))
    {
        return PinResolution::Gpio(gpio);
    }

    PinResolution::Unresolved(value)
}

/// Replace every defined `${name}` in `text`; unknown references stay as written.
pub fn expand_templates(text: &str, substitutions: &Substitutions) -> String {
    template_any_re()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            substitutions
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
