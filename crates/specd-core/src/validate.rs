use crate::delta::ParsedDelta;
use crate::document::{is_section_heading, SpecDocument};
use crate::merge::check_plan;
use crate::requirement::{normalize, Fence};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

const MIN_PURPOSE_LENGTH: usize = 50;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub level: Level,
    /// Where in the document the issue was found, e.g. `requirements[2]`.
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(level: Level, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
    pub summary: ValidationSummary,
}

impl ValidationReport {
    pub fn from_issues(issues: Vec<ValidationIssue>, strict: bool) -> Self {
        let mut summary = ValidationSummary::default();
        for issue in &issues {
            match issue.level {
                Level::Error => summary.errors += 1,
                Level::Warning => summary.warnings += 1,
                Level::Info => summary.info += 1,
            }
        }
        let valid = summary.errors == 0 && (!strict || summary.warnings == 0);
        Self {
            valid,
            issues,
            summary,
        }
    }

    /// Combine several reports, prefixing each issue path with its source.
    pub fn combine<'a>(
        reports: impl IntoIterator<Item = (&'a str, ValidationReport)>,
        strict: bool,
    ) -> Self {
        let issues = reports
            .into_iter()
            .flat_map(|(prefix, report)| {
                report.issues.into_iter().map(move |mut issue| {
                    issue.path = if issue.path.is_empty() {
                        prefix.to_string()
                    } else {
                        format!("{prefix}: {}", issue.path)
                    };
                    issue
                })
            })
            .collect();
        Self::from_issues(issues, strict)
    }
}

// ---------------------------------------------------------------------------
// Spec validation
// ---------------------------------------------------------------------------

static PURPOSE_RE: OnceLock<Regex> = OnceLock::new();

fn purpose_re() -> &'static Regex {
    PURPOSE_RE.get_or_init(|| Regex::new(r"^##\s+Purpose\s*$").expect("valid regex"))
}

/// Text of the `## Purpose` section, or `None` if the heading is absent.
fn purpose_section(text: &str) -> Option<String> {
    let mut fence = Fence::default();
    let mut body: Option<Vec<&str>> = None;
    for line in text.lines() {
        if fence.toggles(line) {
            // delimiter lines are part of the section body
        } else if !fence.is_open() && is_section_heading(line) {
            if body.is_some() {
                break;
            }
            if purpose_re().is_match(line) {
                body = Some(Vec::new());
                continue;
            }
        }
        if let Some(lines) = body.as_mut() {
            lines.push(line);
        }
    }
    body.map(|lines| lines.join("\n").trim().to_string())
}

/// Structural checks on a full specification document. Never fails; the
/// caller decides whether errors are fatal.
pub fn validate_spec(text: &str, spec_name: &str, strict: bool) -> ValidationReport {
    let mut issues = Vec::new();

    match purpose_section(text) {
        None => issues.push(ValidationIssue::new(
            Level::Error,
            "purpose",
            format!("{spec_name}: spec must have a '## Purpose' section"),
        )),
        Some(purpose) if purpose.starts_with("TBD") => issues.push(ValidationIssue::new(
            Level::Info,
            "purpose",
            format!("{spec_name}: Purpose is still a placeholder"),
        )),
        Some(purpose) if purpose.chars().count() < MIN_PURPOSE_LENGTH => {
            issues.push(ValidationIssue::new(
                Level::Warning,
                "purpose",
                format!(
                    "{spec_name}: Purpose section is too brief (less than {MIN_PURPOSE_LENGTH} characters)"
                ),
            ))
        }
        Some(_) => {}
    }

    match SpecDocument::decompose(text) {
        Err(_) => issues.push(ValidationIssue::new(
            Level::Error,
            "requirements",
            format!("{spec_name}: spec must have a '## Requirements' section"),
        )),
        Ok(doc) => {
            if doc.body_blocks.is_empty() {
                issues.push(ValidationIssue::new(
                    Level::Warning,
                    "requirements",
                    format!("{spec_name}: spec has no requirements"),
                ));
            }
            let mut seen = HashSet::new();
            for (i, block) in doc.body_blocks.iter().enumerate() {
                let path = format!("requirements[{i}]");
                if !seen.insert(normalize(&block.name)) {
                    issues.push(ValidationIssue::new(
                        Level::Error,
                        path.clone(),
                        format!("Requirement \"{}\" is declared more than once", block.name),
                    ));
                }
                if !block.has_scenario() {
                    issues.push(ValidationIssue::new(
                        Level::Error,
                        path,
                        format!(
                            "Requirement \"{}\" must include at least one scenario (#### Scenario:)",
                            block.name
                        ),
                    ));
                }
            }
        }
    }

    ValidationReport::from_issues(issues, strict)
}

// ---------------------------------------------------------------------------
// Delta validation
// ---------------------------------------------------------------------------

/// Structural checks on a delta document on its own, without a base spec.
pub fn validate_delta(text: &str, spec_name: &str, strict: bool) -> ValidationReport {
    let mut issues = Vec::new();

    let parsed = match ParsedDelta::parse(text) {
        Ok(parsed) => parsed,
        Err(e) => {
            issues.push(ValidationIssue::new(Level::Error, "", e.to_string()));
            return ValidationReport::from_issues(issues, strict);
        }
    };

    for (section, blocks) in [("ADDED", &parsed.added), ("MODIFIED", &parsed.modified)] {
        for (i, block) in blocks.iter().enumerate() {
            if !block.has_scenario() {
                issues.push(ValidationIssue::new(
                    Level::Error,
                    format!("{section}[{i}]"),
                    format!(
                        "{section} \"{}\" must include at least one scenario (#### Scenario:)",
                        block.name
                    ),
                ));
            }
        }
    }
    for (i, block) in parsed.removed.iter().enumerate() {
        if !block.body().is_empty() {
            issues.push(ValidationIssue::new(
                Level::Warning,
                format!("REMOVED[{i}]"),
                format!(
                    "REMOVED \"{}\" has body text; only the name is used",
                    block.name
                ),
            ));
        }
    }

    let plan = parsed.into_plan();
    if plan.is_empty() {
        issues.push(ValidationIssue::new(
            Level::Error,
            "",
            crate::SpecdError::EmptyDelta.to_string(),
        ));
    } else if let Err(e) = check_plan(&plan, spec_name) {
        issues.push(ValidationIssue::new(Level::Error, "", e.to_string()));
    }

    ValidationReport::from_issues(issues, strict)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
