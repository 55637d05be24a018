use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Header recognition
// ---------------------------------------------------------------------------

static REQUIREMENT_HEADER_RE: OnceLock<Regex> = OnceLock::new();
static SCENARIO_HEADER_RE: OnceLock<Regex> = OnceLock::new();

fn requirement_header_re() -> &'static Regex {
    REQUIREMENT_HEADER_RE
        .get_or_init(|| Regex::new(r"^###\s*Requirement:\s*(.+?)\s*$").expect("valid regex"))
}

fn scenario_header_re() -> &'static Regex {
    SCENARIO_HEADER_RE.get_or_init(|| Regex::new(r"^####\s+Scenario:").expect("valid regex"))
}

/// Extract the requirement name from a `### Requirement: <name>` line.
pub fn parse_requirement_header(line: &str) -> Option<&str> {
    requirement_header_re()
        .captures(line.trim_end_matches('\r'))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub fn requirement_header(name: &str) -> String {
    format!("### Requirement: {}", name.trim())
}

/// Fenced code block state while scanning a document line by line.
/// Headings inside a fence are content, not structure.
///
/// A fence closes only on a run of the same character at least as long as
/// the opener. A backtick line whose remainder holds another backtick is an
/// inline code span, not an opener.
#[derive(Debug, Default)]
pub(crate) struct Fence {
    open: Option<(char, usize)>,
}

impl Fence {
    /// Feed the next line. Returns `true` if it opened or closed a fence.
    pub(crate) fn toggles(&mut self, line: &str) -> bool {
        let t = line.trim_start().trim_end_matches('\r');
        let Some(ch) = t.chars().next().filter(|c| *c == '`' || *c == '~') else {
            return false;
        };
        let run = t.chars().take_while(|c| *c == ch).count();
        if run < 3 {
            return false;
        }
        let rest = &t[run * ch.len_utf8()..];

        match self.open {
            Some((open_ch, open_run)) => {
                if ch == open_ch && run >= open_run && rest.trim().is_empty() {
                    self.open = None;
                    true
                } else {
                    false
                }
            }
            None => {
                if ch == '`' && rest.contains('`') {
                    return false;
                }
                self.open = Some((ch, run));
                true
            }
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.is_some()
    }
}

// ---------------------------------------------------------------------------
// NormalizedKey
// ---------------------------------------------------------------------------

/// The form of a requirement name used for every equality comparison.
///
/// Only leading and trailing whitespace is removed; case and interior
/// whitespace are significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn normalize(name: &str) -> NormalizedKey {
    NormalizedKey(name.trim().to_string())
}

// ---------------------------------------------------------------------------
// RequirementBlock
// ---------------------------------------------------------------------------

/// One `### Requirement:` header and everything up to the next requirement
/// header or section boundary. `raw` always starts with `header_line`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementBlock {
    pub name: String,
    pub header_line: String,
    pub raw: String,
}

impl RequirementBlock {
    /// Build a block from its text. Returns `None` unless the first line is
    /// a requirement header. Trailing whitespace is dropped.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let raw = raw.trim_end();
        let header_line = raw.lines().next()?.trim_end().to_string();
        let name = parse_requirement_header(&header_line)?.to_string();
        let rest = &raw[raw.lines().next().map(str::len).unwrap_or(0)..];
        Some(Self {
            name,
            raw: format!("{header_line}{rest}"),
            header_line,
        })
    }

    pub fn key(&self) -> NormalizedKey {
        normalize(&self.name)
    }

    /// The name as written in the first line of `raw`, which may disagree
    /// with `name` if the block was assembled by hand.
    pub fn header_name(&self) -> Option<&str> {
        self.raw.lines().next().and_then(parse_requirement_header)
    }

    /// Everything after the header line, trimmed.
    pub fn body(&self) -> &str {
        let rest = self.raw.strip_prefix(&self.header_line).unwrap_or_else(|| {
            let first_len = self.raw.lines().next().map(str::len).unwrap_or(0);
            &self.raw[first_len..]
        });
        rest.trim()
    }

    pub fn has_scenario(&self) -> bool {
        let mut fence = Fence::default();
        for line in self.raw.lines() {
            if fence.toggles(line) {
                continue;
            }
            if !fence.is_open() && scenario_header_re().is_match(line) {
                return true;
            }
        }
        false
    }

    /// Copy of this block under a new name. Only the header line changes.
    pub fn renamed(&self, to: &str) -> Self {
        let header_line = requirement_header(to);
        let rest = self.raw.strip_prefix(&self.header_line).unwrap_or_else(|| {
            let first_len = self.raw.lines().next().map(str::len).unwrap_or(0);
            &self.raw[first_len..]
        });
        Self {
            name: to.trim().to_string(),
            raw: format!("{header_line}{rest}"),
            header_line,
        }
    }
}

/// Split the lines of one section into free text preceding the first
/// requirement header and the requirement blocks that follow it.
pub(crate) fn split_blocks(lines: &[&str]) -> (String, Vec<RequirementBlock>) {
    let mut preamble: Vec<&str> = Vec::new();
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut fence = Fence::default();

    for &line in lines {
        if fence.toggles(line) {
            // delimiter lines stay with the surrounding block
        } else if !fence.is_open() && parse_requirement_header(line).is_some() {
            blocks.push(vec![line]);
            continue;
        }
        match blocks.last_mut() {
            Some(current) => current.push(line),
            None => preamble.push(line),
        }
    }

    let blocks = blocks
        .iter()
        .filter_map(|lines| RequirementBlock::from_raw(&lines.join("\n")))
        .collect();
    (preamble.join("\n").trim_end().to_string(), blocks)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
