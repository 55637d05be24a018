use crate::delta::{DeltaPlan, Section};
use crate::document::SpecDocument;
use crate::error::{Result, SpecdError};
use crate::requirement::{normalize, NormalizedKey, RequirementBlock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::ops::AddAssign;

// ---------------------------------------------------------------------------
// MergeOptions / MergeCounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Write rebuilt specs even if they fail structural validation.
    pub skip_validation: bool,
    /// Treat validation warnings as failures.
    pub strict: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeCounts {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub renamed: usize,
}

impl MergeCounts {
    pub fn total(&self) -> usize {
        self.added + self.modified + self.removed + self.renamed
    }
}

impl AddAssign for MergeCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.added += rhs.added;
        self.modified += rhs.modified;
        self.removed += rhs.removed;
        self.renamed += rhs.renamed;
    }
}

// ---------------------------------------------------------------------------
// MergedRequirements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Index into the base document's blocks.
    Base(usize),
    Added,
}

#[derive(Debug, Clone)]
struct Entry {
    block: RequirementBlock,
    origin: Origin,
}

/// Requirement set produced by [`plan`]. Owned by a single merge and
/// consumed by [`SpecDocument::recompose`].
#[derive(Debug, Clone, Default)]
pub struct MergedRequirements {
    entries: HashMap<NormalizedKey, Entry>,
    /// ADDED keys in declaration order.
    added: Vec<NormalizedKey>,
    counts: MergeCounts,
    warnings: Vec<String>,
}

impl MergedRequirements {
    pub fn get(&self, key: &NormalizedKey) -> Option<&RequirementBlock> {
        self.entries.get(key).map(|e| &e.block)
    }

    pub fn counts(&self) -> MergeCounts {
        self.counts
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Surviving base blocks in their original order (renamed blocks stay in
    /// place), then additions in declaration order.
    pub(crate) fn ordered_blocks(&self, base_len: usize) -> Vec<&RequirementBlock> {
        let mut by_index: Vec<Option<&RequirementBlock>> = vec![None; base_len];
        for entry in self.entries.values() {
            if let Origin::Base(i) = entry.origin {
                if let Some(slot) = by_index.get_mut(i) {
                    *slot = Some(&entry.block);
                }
            }
        }
        let added = self.added.iter().filter_map(|k| self.get(k));
        by_index.into_iter().flatten().chain(added).collect()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn unique_keys<'a>(
    spec: &str,
    section: Section,
    names: impl Iterator<Item = &'a str>,
) -> Result<HashSet<NormalizedKey>> {
    let mut seen = HashSet::new();
    for name in names {
        let key = normalize(name);
        if !seen.insert(key.clone()) {
            return Err(SpecdError::DuplicateRequirement {
                spec: spec.to_string(),
                section,
                name: key.to_string(),
            });
        }
    }
    Ok(seen)
}

/// Checks that need no base document: duplicates within a section,
/// names shared across ADDED/MODIFIED/REMOVED, and rename interplay.
pub fn check_plan(delta: &DeltaPlan, spec: &str) -> Result<()> {
    let added = unique_keys(spec, Section::Added, delta.added.iter().map(|b| b.name.as_str()))?;
    let modified = unique_keys(
        spec,
        Section::Modified,
        delta.modified.iter().map(|b| b.name.as_str()),
    )?;
    let removed = unique_keys(spec, Section::Removed, delta.removed.iter().map(String::as_str))?;
    unique_keys(
        spec,
        Section::RenamedFrom,
        delta.renamed.iter().map(|r| r.from.as_str()),
    )?;
    unique_keys(
        spec,
        Section::RenamedTo,
        delta.renamed.iter().map(|r| r.to.as_str()),
    )?;

    let conflict = |name: &NormalizedKey, first: Section, second: Section| {
        SpecdError::CrossSectionConflict {
            spec: spec.to_string(),
            name: name.to_string(),
            first,
            second,
        }
    };
    for block in &delta.modified {
        let key = block.key();
        if removed.contains(&key) {
            return Err(conflict(&key, Section::Modified, Section::Removed));
        }
        if added.contains(&key) {
            return Err(conflict(&key, Section::Modified, Section::Added));
        }
    }
    for block in &delta.added {
        let key = block.key();
        if removed.contains(&key) {
            return Err(conflict(&key, Section::Added, Section::Removed));
        }
    }

    for rename in &delta.renamed {
        let from = normalize(&rename.from);
        let to = normalize(&rename.to);
        if modified.contains(&from) {
            return Err(SpecdError::RenameModifyOrder {
                spec: spec.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        if added.contains(&to) {
            return Err(SpecdError::RenameAddCollision {
                spec: spec.to_string(),
                to: to.to_string(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Validate `delta` and apply it to the requirements of `base` in the order
/// RENAMED, REMOVED, MODIFIED, ADDED. `base` is `None` when the spec does
/// not exist yet. Nothing is returned unless every operation applies.
pub fn plan(
    base: Option<&SpecDocument>,
    delta: &DeltaPlan,
    spec: &str,
) -> Result<MergedRequirements> {
    check_plan(delta, spec)?;

    let mut warnings = Vec::new();
    if base.is_none() {
        if !delta.modified.is_empty() {
            return Err(SpecdError::NewSpecInvalidOperation {
                spec: spec.to_string(),
                operation: Section::Modified,
            });
        }
        if !delta.renamed.is_empty() {
            return Err(SpecdError::NewSpecInvalidOperation {
                spec: spec.to_string(),
                operation: Section::Renamed,
            });
        }
        if !delta.removed.is_empty() {
            tracing::warn!(
                spec,
                count = delta.removed.len(),
                "ignoring REMOVED requirements for new spec"
            );
            warnings.push(format!(
                "{spec}: target spec does not exist; ignoring {} REMOVED requirement(s)",
                delta.removed.len()
            ));
        }
    }

    let mut entries: HashMap<NormalizedKey, Entry> = HashMap::new();
    if let Some(base) = base {
        for (i, block) in base.body_blocks.iter().enumerate() {
            let key = block.key();
            if entries.contains_key(&key) {
                return Err(SpecdError::DuplicateRequirement {
                    spec: spec.to_string(),
                    section: Section::Base,
                    name: key.to_string(),
                });
            }
            entries.insert(
                key,
                Entry {
                    block: block.clone(),
                    origin: Origin::Base(i),
                },
            );
        }
    }

    let mut counts = MergeCounts::default();

    for rename in &delta.renamed {
        let from = normalize(&rename.from);
        let to = normalize(&rename.to);
        if !entries.contains_key(&from) {
            return Err(SpecdError::RenameSourceMissing {
                spec: spec.to_string(),
                name: from.to_string(),
            });
        }
        if entries.contains_key(&to) {
            return Err(SpecdError::RenameTargetExists {
                spec: spec.to_string(),
                name: to.to_string(),
            });
        }
        let Some(entry) = entries.remove(&from) else {
            continue;
        };
        entries.insert(
            to,
            Entry {
                block: entry.block.renamed(&rename.to),
                origin: entry.origin,
            },
        );
        counts.renamed += 1;
    }
    tracing::debug!(spec, renamed = counts.renamed, "applied RENAMED");

    if base.is_some() {
        for name in &delta.removed {
            let key = normalize(name);
            if entries.remove(&key).is_none() {
                return Err(SpecdError::RemovalTargetMissing {
                    spec: spec.to_string(),
                    name: key.to_string(),
                });
            }
            counts.removed += 1;
        }
    }
    tracing::debug!(spec, removed = counts.removed, "applied REMOVED");

    for block in &delta.modified {
        let key = block.key();
        let Some(entry) = entries.get_mut(&key) else {
            return Err(SpecdError::ModifyTargetMissing {
                spec: spec.to_string(),
                name: key.to_string(),
            });
        };
        let header = block.header_name().unwrap_or_default();
        if normalize(header) != key {
            return Err(SpecdError::HeaderKeyMismatch {
                spec: spec.to_string(),
                key: key.to_string(),
                header: block.header_line.clone(),
            });
        }
        entry.block = block.clone();
        counts.modified += 1;
    }
    tracing::debug!(spec, modified = counts.modified, "applied MODIFIED");

    let mut added = Vec::with_capacity(delta.added.len());
    for block in &delta.added {
        let key = block.key();
        if entries.contains_key(&key) {
            return Err(SpecdError::DuplicateAddition {
                spec: spec.to_string(),
                name: key.to_string(),
            });
        }
        entries.insert(
            key.clone(),
            Entry {
                block: block.clone(),
                origin: Origin::Added,
            },
        );
        added.push(key);
        counts.added += 1;
    }
    tracing::debug!(spec, added = counts.added, "applied ADDED");

    Ok(MergedRequirements {
        entries,
        added,
        counts,
        warnings,
    })
}

// ---------------------------------------------------------------------------
// merge_spec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub rebuilt_document: String,
    pub counts: MergeCounts,
    pub warnings: Vec<String>,
    /// The spec did not exist and was synthesized from the skeleton.
    pub created: bool,
}

/// Parse `delta_text`, plan it against `base_text` (or a fresh skeleton),
/// and rebuild the document. Pure: performs no I/O.
pub fn merge_spec(
    base_text: Option<&str>,
    delta_text: &str,
    spec: &str,
    change_id: &str,
) -> Result<MergeResult> {
    let delta = DeltaPlan::parse(delta_text)?;
    let base = base_text.map(SpecDocument::decompose).transpose()?;
    let merged = plan(base.as_ref(), &delta, spec)?;
    let created = base.is_none();
    let doc = base.unwrap_or_else(|| SpecDocument::skeleton(spec, change_id));

    Ok(MergeResult {
        rebuilt_document: doc.recompose(&merged),
        counts: merged.counts,
        warnings: merged.warnings,
        created,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
