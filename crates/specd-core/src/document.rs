use crate::error::{Result, SpecdError};
use crate::merge::MergedRequirements;
use crate::requirement::{split_blocks, Fence, RequirementBlock};
use regex::Regex;
use std::sync::OnceLock;

pub const REQUIREMENTS_HEADER: &str = "## Requirements";

static REQUIREMENTS_RE: OnceLock<Regex> = OnceLock::new();
static MULTI_BLANK_RE: OnceLock<Regex> = OnceLock::new();

fn requirements_re() -> &'static Regex {
    REQUIREMENTS_RE.get_or_init(|| Regex::new(r"^##\s+Requirements\s*$").expect("valid regex"))
}

fn multi_blank_re() -> &'static Regex {
    MULTI_BLANK_RE.get_or_init(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("valid regex"))
}

/// A level-2 markdown heading (`## ...`), not `###` or deeper.
pub(crate) fn is_section_heading(line: &str) -> bool {
    line.starts_with("##") && !line.starts_with("###") && {
        let rest = &line[2..];
        rest.is_empty() || rest.starts_with(char::is_whitespace)
    }
}

// ---------------------------------------------------------------------------
// SpecDocument
// ---------------------------------------------------------------------------

/// A specification split around its `## Requirements` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDocument {
    /// Title, Purpose, and anything else ahead of the Requirements heading.
    pub before: String,
    pub header_line: String,
    /// Free text between the heading and the first requirement.
    pub preamble: String,
    pub body_blocks: Vec<RequirementBlock>,
    /// The next level-2 section onward, if any.
    pub after: String,
}

impl SpecDocument {
    pub fn decompose(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text.split('\n').collect();

        let mut fence = Fence::default();
        let mut header_idx = None;
        for (i, line) in lines.iter().enumerate() {
            if fence.toggles(line) {
                continue;
            }
            if !fence.is_open() && requirements_re().is_match(line.trim_end_matches('\r')) {
                header_idx = Some(i);
                break;
            }
        }
        let header_idx = header_idx.ok_or(SpecdError::MalformedSpec)?;

        let mut fence = Fence::default();
        let mut end_idx = lines.len();
        for (offset, line) in lines[header_idx + 1..].iter().enumerate() {
            if fence.toggles(line) {
                continue;
            }
            if !fence.is_open() && is_section_heading(line) {
                end_idx = header_idx + 1 + offset;
                break;
            }
        }

        let (preamble, body_blocks) = split_blocks(&lines[header_idx + 1..end_idx]);

        Ok(Self {
            before: lines[..header_idx].join("\n"),
            header_line: lines[header_idx].trim_end().to_string(),
            preamble,
            body_blocks,
            after: lines[end_idx..].join("\n"),
        })
    }

    /// Starting point for a capability that has no specification yet.
    pub fn skeleton(spec_name: &str, change_id: &str) -> Self {
        Self {
            before: format!(
                "# {spec_name} Specification\n\n## Purpose\nTBD - created by archiving change {change_id}. Update Purpose after archive.\n"
            ),
            header_line: REQUIREMENTS_HEADER.to_string(),
            preamble: String::new(),
            body_blocks: Vec::new(),
            after: String::new(),
        }
    }

    /// Reassemble the document with the merged requirement set. Retained
    /// requirements keep their original position; additions are appended
    /// in declaration order.
    pub fn recompose(&self, merged: &MergedRequirements) -> String {
        let blocks = merged.ordered_blocks(self.body_blocks.len());
        self.render(blocks.into_iter().map(|b| b.raw.as_str()))
    }

    /// Serialize the document as-is.
    pub fn render_unchanged(&self) -> String {
        self.render(self.body_blocks.iter().map(|b| b.raw.as_str()))
    }

    fn render<'a>(&'a self, blocks: impl Iterator<Item = &'a str>) -> String {
        let mut parts: Vec<&str> = Vec::new();
        let before = self.before.trim_end();
        if !before.is_empty() {
            parts.push(before);
        }
        parts.push(&self.header_line);
        let preamble = self.preamble.trim_matches(|c: char| c == '\n' || c == '\r').trim_end();
        if !preamble.is_empty() {
            parts.push(preamble);
        }
        parts.extend(blocks.map(str::trim_end));
        let after = self.after.trim_matches(|c: char| c == '\n' || c == '\r').trim_end();
        if !after.is_empty() {
            parts.push(after);
        }

        let joined = parts.join("\n\n");
        let mut out = multi_blank_re().replace_all(&joined, "\n\n").into_owned();
        out.push('\n');
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
