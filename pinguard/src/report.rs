//! Check results and findings.

use serde::{Deserialize, Serialize};

use crate::checker::{PinAssessment, PinIssue};
use crate::parser::{expand_templates, ParsedConfig, PinUsage, Substitutions};
use crate::pinouts::{BoardDefinition, Severity};

/// One reportable problem on one GPIO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: String,
    pub rule_id: String,
    pub gpio: u32,
    pub severity: Severity,
    pub message: String,
    /// Line of the first usage of the GPIO.
    pub line: Option<usize>,
    /// Best label of the component using the GPIO.
    pub component: Option<String>,
}

impl Finding {
    pub fn new(gpio: u32, issue: &PinIssue, usages: &[PinUsage], substitutions: &Substitutions) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id: issue.kind.rule_id().to_string(),
            gpio,
            severity: issue.severity,
            message: format!("GPIO{}: {}", gpio, issue.text),
            line: usages.first().map(|u| u.line),
            component: component_label(usages, substitutions),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSummary {
    pub kind: String,
    pub display_name: String,
}

impl From<&BoardDefinition> for LayoutSummary {
    fn from(def: &BoardDefinition) -> Self {
        Self {
            kind: def.kind().to_string(),
            display_name: def.display_name().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStats {
    pub danger: usize,
    pub warn: usize,
    pub info: usize,
    pub unresolved: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub file: String,
    pub config: ParsedConfig,
    pub layout: Option<LayoutSummary>,
    pub findings: Vec<Finding>,
    pub stats: CheckStats,
}

impl CheckResult {
    /// Result for text that is not an ESPHome config.
    pub fn skipped(file: impl Into<String>, config: ParsedConfig) -> Self {
        Self {
            file: file.into(),
            config,
            layout: None,
            findings: Vec::new(),
            stats: CheckStats::default(),
        }
    }

    pub fn new(
        file: impl Into<String>,
        config: ParsedConfig,
        layout: &BoardDefinition,
        assessments: &[PinAssessment],
    ) -> Self {
        let findings = build_findings(&config, assessments);
        let mut stats = CheckStats {
            unresolved: config.unresolved.len(),
            ..CheckStats::default()
        };
        for finding in &findings {
            match finding.severity {
                Severity::Danger => stats.danger += 1,
                Severity::Warn => stats.warn += 1,
                Severity::Info => stats.info += 1,
            }
        }

        Self {
            file: file.into(),
            config,
            layout: Some(layout.into()),
            findings,
            stats,
        }
    }

    pub fn is_config(&self) -> bool {
        self.config.ok
    }

    pub fn total_findings(&self) -> usize {
        self.findings.len()
    }

    pub fn worst_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    pub fn has_findings_at_or_above(&self, threshold: Severity) -> bool {
        self.worst_severity().is_some_and(|s| s >= threshold)
    }
}

pub fn build_findings(config: &ParsedConfig, assessments: &[PinAssessment]) -> Vec<Finding> {
    assessments
        .iter()
        .flat_map(|assessment| {
            let usages = config.usages(assessment.gpio);
            assessment
                .issues
                .iter()
                .map(move |issue| Finding::new(assessment.gpio, issue, usages, &config.substitutions))
        })
        .collect()
}

/// Short label for the component behind a GPIO.
///
/// Prefers the first usage with a name, then one with an id. Templates are
/// expanded and a `+N` suffix counts the other usages. `None` when no usage
/// carries a name or id.
pub fn best_usage_label(usages: &[PinUsage], substitutions: &Substitutions) -> Option<String> {
    let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    let pick = usages
        .iter()
        .find(|u| has(&u.name))
        .or_else(|| usages.iter().find(|u| has(&u.id)))
        .or_else(|| usages.first())?;

    let name = pick.name.as_deref().map(|n| expand_templates(n, substitutions));
    let id = pick.id.as_deref().map(|i| expand_templates(i, substitutions));

    let label = match (name, id) {
        (Some(name), Some(id)) => format!("{} (id: {})", name, id),
        (Some(name), None) => name,
        (None, Some(id)) => id,
        (None, None) => return None,
    };

    Some(with_more_suffix(label, usages.len()))
}

fn with_more_suffix(label: String, count: usize) -> String {
    if count > 1 {
        format!("{} +{}", label, count - 1)
    } else {
        label
    }
}

/// Best label, or the first usage's context label when nothing is named.
fn component_label(usages: &[PinUsage], substitutions: &Substitutions) -> Option<String> {
    best_usage_label(usages, substitutions).or_else(|| {
        usages
            .first()
            .map(|u| with_more_suffix(u.label(), usages.len()))
    })
}
