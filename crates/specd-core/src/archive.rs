//! All-or-nothing application of a change's deltas to the spec tree.
//!
//! [`prepare`] merges and validates every target in memory. Only when all
//! of them succeed does it return a [`CommitPlan`], and only
//! [`CommitPlan::commit`] touches the filesystem.

use crate::error::{Result, SpecdError};
use crate::io;
use crate::merge::{merge_spec, MergeCounts, MergeOptions};
use crate::validate::{validate_spec, ValidationReport};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// One capability touched by a change: its delta, the current spec text
/// (if any), and where the rebuilt spec will be written.
#[derive(Debug, Clone)]
pub struct ArchiveTarget {
    pub capability: String,
    pub delta: String,
    pub base: Option<String>,
    pub path: PathBuf,
}

// ---------------------------------------------------------------------------
// Abort
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum AbortReason {
    Merge(SpecdError),
    Validation(ValidationReport),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Merge(e) => write!(f, "{e}"),
            AbortReason::Validation(report) => {
                write!(
                    f,
                    "rebuilt spec failed validation ({} error(s), {} warning(s))",
                    report.summary.errors, report.summary.warnings
                )?;
                for issue in &report.issues {
                    write!(f, "\n  [{:?}] {}: {}", issue.level, issue.path, issue.message)?;
                }
                Ok(())
            }
        }
    }
}

/// Why a change could not be archived. No spec has been written.
#[derive(Debug, Error)]
#[error("{capability}: {reason}")]
pub struct ArchiveAbort {
    pub capability: String,
    pub reason: AbortReason,
}

// ---------------------------------------------------------------------------
// Plan / report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PreparedWrite {
    pub capability: String,
    pub path: PathBuf,
    pub content: String,
    pub counts: MergeCounts,
    pub created: bool,
    pub warnings: Vec<String>,
}

/// Rebuilt documents for every target, ready to be written.
#[derive(Debug, Clone)]
pub struct CommitPlan {
    pub change_id: String,
    writes: Vec<PreparedWrite>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetSummary {
    pub capability: String,
    pub counts: MergeCounts,
    pub created: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveReport {
    pub change_id: String,
    pub targets: Vec<TargetSummary>,
    pub totals: MergeCounts,
}

// ---------------------------------------------------------------------------
// Phase 1
// ---------------------------------------------------------------------------

/// Merge and validate every target without side effects. The first
/// failing target aborts the whole change.
pub fn prepare(
    change_id: &str,
    targets: &[ArchiveTarget],
    options: &MergeOptions,
) -> std::result::Result<CommitPlan, ArchiveAbort> {
    let mut writes = Vec::with_capacity(targets.len());

    for target in targets {
        tracing::debug!(change = change_id, capability = %target.capability, "preparing spec update");
        let abort = |reason| ArchiveAbort {
            capability: target.capability.clone(),
            reason,
        };

        let result = merge_spec(
            target.base.as_deref(),
            &target.delta,
            &target.capability,
            change_id,
        )
        .map_err(|e| abort(AbortReason::Merge(e)))?;

        if !options.skip_validation {
            let report = validate_spec(&result.rebuilt_document, &target.capability, options.strict);
            if !report.valid {
                return Err(abort(AbortReason::Validation(report)));
            }
        }

        writes.push(PreparedWrite {
            capability: target.capability.clone(),
            path: target.path.clone(),
            content: result.rebuilt_document,
            counts: result.counts,
            created: result.created,
            warnings: result.warnings,
        });
    }

    Ok(CommitPlan {
        change_id: change_id.to_string(),
        writes,
    })
}

// ---------------------------------------------------------------------------
// Phase 2
// ---------------------------------------------------------------------------

impl CommitPlan {
    pub fn writes(&self) -> &[PreparedWrite] {
        &self.writes
    }

    /// Write every rebuilt spec in plan order and total the counts.
    pub fn commit(self) -> Result<ArchiveReport> {
        let mut totals = MergeCounts::default();
        let mut targets = Vec::with_capacity(self.writes.len());

        for write in self.writes {
            io::atomic_write(&write.path, write.content.as_bytes())?;
            tracing::info!(
                capability = %write.capability,
                added = write.counts.added,
                modified = write.counts.modified,
                removed = write.counts.removed,
                renamed = write.counts.renamed,
                "spec updated"
            );
            totals += write.counts;
            targets.push(TargetSummary {
                capability: write.capability,
                counts: write.counts,
                created: write.created,
                warnings: write.warnings,
            });
        }

        Ok(ArchiveReport {
            change_id: self.change_id,
            targets,
            totals,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
