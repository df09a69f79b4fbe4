//! Pin Hazard Checker
//!
//! Matches every GPIO a config uses against the rules of the resolved board
//! layout, and flags GPIOs the layout does not break out.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::parser::ParsedConfig;
use crate::pinouts::{BoardDefinition, Severity};

pub const NOT_PRESENT_TEXT: &str = "GPIO not present or not broken out on this board layout.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    /// A layout rule matched.
    PinRule,
    /// The GPIO is missing from the layout's available set.
    PinNotPresent,
}

impl IssueKind {
    pub fn rule_id(self) -> &'static str {
        match self {
            IssueKind::PinRule => "pin-rule",
            IssueKind::PinNotPresent => "pin-not-present",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub text: String,
}

/// All issues for one used GPIO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinAssessment {
    pub gpio: u32,
    pub issues: Vec<PinIssue>,
    /// Highest severity among `issues`, `None` when there are none.
    pub severity: Option<Severity>,
}

pub fn max_severity(issues: &[PinIssue]) -> Option<Severity> {
    issues.iter().map(|i| i.severity).max()
}

/// Checker bound to one resolved layout.
pub struct PinChecker<'a> {
    layout: &'a BoardDefinition,
    available: BTreeSet<u32>,
}

impl<'a> PinChecker<'a> {
    pub fn new(layout: &'a BoardDefinition) -> Self {
        Self {
            layout,
            available: layout.available_gpios(),
        }
    }

    pub fn is_available(&self, gpio: u32) -> bool {
        self.available.is_empty() || self.available.contains(&gpio)
    }

    /// Matching rules in declaration order, then the availability issue.
    pub fn pin_issues(&self, gpio: u32, psram_mode: Option<&str>) -> Vec<PinIssue> {
        let mut issues: Vec<PinIssue> = self
            .layout
            .pin_issues()
            .iter()
            .filter(|rule| rule.applies(gpio, psram_mode))
            .map(|rule| PinIssue {
                kind: IssueKind::PinRule,
                severity: rule.severity,
                text: rule.text.clone(),
            })
            .collect();

        if !self.is_available(gpio) {
            issues.push(PinIssue {
                kind: IssueKind::PinNotPresent,
                severity: Severity::Danger,
                text: NOT_PRESENT_TEXT.to_string(),
            });
        }

        issues
    }

    /// One assessment per used GPIO, ascending.
    pub fn check(&self, config: &ParsedConfig) -> Vec<PinAssessment> {
        let psram_mode = config.psram_mode.as_deref();
        config
            .used_pins
            .keys()
            .map(|&gpio| {
                let issues = self.pin_issues(gpio, psram_mode);
                PinAssessment {
                    gpio,
                    severity: max_severity(&issues),
                    issues,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pinouts::{PinRule, SocGrid};

    fn grid(gpios: Vec<u32>, rules: Vec<PinRule>) -> BoardDefinition {
        BoardDefinition::SocGrid(SocGrid {
            id: None,
            display_name: "Test".into(),
            soc_ref: None,
            variant: None,
            gpios,
            notes: vec![],
            pin_issues: rules,
        })
    }

    fn rule(json: &str) -> PinRule {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_rules_in_declaration_order() {
        let layout = grid(
            (0..40).collect(),
            vec![
                rule(r#"{"gpios":[12],"severity":"danger","text":"strap"}"#),
                rule(r#"{"gpioRange":[10,15],"severity":"info","text":"range"}"#),
                rule(r#"{"gpios":[13],"severity":"warn","text":"other"}"#),
            ],
        );
        let issues = PinChecker::new(&layout).pin_issues(12, None);
        let texts: Vec<&str> = issues.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["strap", "range"]);
        assert_eq!(max_severity(&issues), Some(Severity::Danger));
    }

    #[test]
    fn test_not_present_is_appended() {
        let layout = grid(vec![1, 2, 3], vec![rule(r#"{"gpios":[9],"severity":"info","text":"x"}"#)]);
        let issues = PinChecker::new(&layout).pin_issues(9, None);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[1].kind, IssueKind::PinNotPresent);
        assert_eq!(issues[1].severity, Severity::Danger);
        assert_eq!(issues[1].text, NOT_PRESENT_TEXT);
    }

    #[test]
    fn test_unknown_layout_has_no_availability_issue() {
        let layout = BoardDefinition::unknown(Some("x"));
        assert!(PinChecker::new(&layout).pin_issues(99, None).is_empty());
    }

    #[test]
    fn test_clean_pin_has_no_severity() {
        let layout = grid(vec![4], vec![]);
        let issues = PinChecker::new(&layout).pin_issues(4, None);
        assert!(issues.is_empty());
        assert_eq!(max_severity(&issues), None);
    }
}
