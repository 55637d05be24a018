use crate::document::is_section_heading;
use crate::error::{Result, SpecdError};
use crate::requirement::{split_blocks, Fence, RequirementBlock};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// Where a requirement name was declared. Used to label validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Added,
    Modified,
    Removed,
    Renamed,
    RenamedFrom,
    RenamedTo,
    /// The base specification itself.
    Base,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Section::Added => "ADDED",
            Section::Modified => "MODIFIED",
            Section::Removed => "REMOVED",
            Section::Renamed => "RENAMED",
            Section::RenamedFrom => "RENAMED FROM",
            Section::RenamedTo => "RENAMED TO",
            Section::Base => "base spec",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// DeltaPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

/// The operations declared by one delta document, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaPlan {
    pub added: Vec<RequirementBlock>,
    pub modified: Vec<RequirementBlock>,
    pub removed: Vec<String>,
    pub renamed: Vec<Rename>,
}

impl DeltaPlan {
    pub fn parse(text: &str) -> Result<Self> {
        let plan = ParsedDelta::parse(text)?.into_plan();
        if plan.is_empty() {
            return Err(SpecdError::EmptyDelta);
        }
        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.modified.is_empty()
            && self.removed.is_empty()
            && self.renamed.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

static SECTION_RE: OnceLock<Regex> = OnceLock::new();
static RENAME_RE: OnceLock<Regex> = OnceLock::new();

fn section_re() -> &'static Regex {
    SECTION_RE.get_or_init(|| {
        Regex::new(r"(?i)^##\s+(ADDED|MODIFIED|REMOVED|RENAMED)\s+Requirements\s*$")
            .expect("valid regex")
    })
}

fn rename_re() -> &'static Regex {
    RENAME_RE.get_or_init(|| {
        Regex::new(r"^\s*-?\s*(?i:(FROM|TO)):\s*`?\s*###\s*Requirement:\s*(.+?)\s*`?\s*$")
            .expect("valid regex")
    })
}

/// Delta content before the REMOVED bodies are discarded. Validation
/// reports on those bodies; merging never looks at them.
#[derive(Debug, Default)]
pub(crate) struct ParsedDelta {
    pub added: Vec<RequirementBlock>,
    pub modified: Vec<RequirementBlock>,
    pub removed: Vec<RequirementBlock>,
    pub renamed: Vec<Rename>,
}

impl ParsedDelta {
    pub fn parse(text: &str) -> Result<Self> {
        // Each occurrence of a section header opens its own group so that
        // repeated headers never glue blocks across occurrences.
        let mut groups: Vec<(Section, Vec<(usize, &str)>)> = Vec::new();
        let mut in_section = false;
        let mut fence = Fence::default();

        for (idx, line) in text.split('\n').enumerate() {
            if fence.toggles(line) {
                // fall through: delimiter lines belong to the current section
            } else if !fence.is_open() && is_section_heading(line) {
                let section = section_re()
                    .captures(line.trim_end_matches('\r'))
                    .and_then(|c| c.get(1))
                    .map(|m| match m.as_str().to_ascii_uppercase().as_str() {
                        "ADDED" => Section::Added,
                        "MODIFIED" => Section::Modified,
                        "REMOVED" => Section::Removed,
                        _ => Section::Renamed,
                    });
                in_section = section.is_some();
                if let Some(section) = section {
                    groups.push((section, Vec::new()));
                }
                continue;
            }
            if in_section {
                if let Some((_, lines)) = groups.last_mut() {
                    lines.push((idx + 1, line));
                }
            }
        }

        let mut parsed = Self::default();
        for (section, lines) in groups {
            if section == Section::Renamed {
                parsed.renamed.extend(parse_renames(&lines)?);
                continue;
            }
            let text: Vec<&str> = lines.iter().map(|&(_, l)| l).collect();
            let (_, blocks) = split_blocks(&text);
            match section {
                Section::Added => parsed.added.extend(blocks),
                Section::Modified => parsed.modified.extend(blocks),
                _ => parsed.removed.extend(blocks),
            }
        }
        Ok(parsed)
    }

    pub fn into_plan(self) -> DeltaPlan {
        DeltaPlan {
            added: self.added,
            modified: self.modified,
            removed: self.removed.into_iter().map(|b| b.name).collect(),
            renamed: self.renamed,
        }
    }
}

fn parse_renames(lines: &[(usize, &str)]) -> Result<Vec<Rename>> {
    let mut renames = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for &(line_no, line) in lines {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let Some(caps) = rename_re().captures(line) else {
            return Err(SpecdError::MalformedDelta {
                line: line_no,
                reason: "expected a '- FROM:' or '- TO:' requirement header in RENAMED".to_string(),
            });
        };
        let name = caps[2].trim().to_string();
        if caps[1].eq_ignore_ascii_case("FROM") {
            if let Some((from_line, _)) = pending {
                return Err(SpecdError::MalformedDelta {
                    line: from_line,
                    reason: "RENAMED FROM without a matching TO".to_string(),
                });
            }
            pending = Some((line_no, name));
        } else {
            let Some((_, from)) = pending.take() else {
                return Err(SpecdError::MalformedDelta {
                    line: line_no,
                    reason: "RENAMED TO without a preceding FROM".to_string(),
                });
            };
            renames.push(Rename { from, to: name });
        }
    }

    if let Some((line, _)) = pending {
        return Err(SpecdError::MalformedDelta {
            line,
            reason: "RENAMED FROM without a matching TO".to_string(),
        });
    }
    Ok(renames)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
