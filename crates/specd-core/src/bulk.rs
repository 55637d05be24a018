//! Validation of many independent changes and specs on a bounded pool.

use crate::error::{Result, SpecdError};
use crate::validate::{validate_delta, validate_spec, Level, ValidationIssue, ValidationReport};
use crate::workspace::Workspace;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub use crate::config::DEFAULT_CONCURRENCY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Change,
    Spec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItem {
    pub kind: ItemKind,
    pub id: String,
}

impl BulkItem {
    pub fn change(id: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Change,
            id: id.into(),
        }
    }

    pub fn spec(id: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Spec,
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub kind: ItemKind,
    pub id: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ValidationReport>,
    /// Set when the item could not be read at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BulkTotals {
    pub items: usize,
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkReport {
    pub items: Vec<BulkOutcome>,
    pub totals: BulkTotals,
}

impl BulkReport {
    pub fn all_valid(&self) -> bool {
        self.totals.failed == 0
    }
}

/// Every active change and every spec in the workspace.
pub fn collect_items(workspace: &Workspace, changes: bool, specs: bool) -> Result<Vec<BulkItem>> {
    let mut items = Vec::new();
    if changes {
        items.extend(workspace.list_changes()?.into_iter().map(BulkItem::change));
    }
    if specs {
        items.extend(workspace.list_specs()?.into_iter().map(BulkItem::spec));
    }
    Ok(items)
}

/// Validate one change: each of its delta specs on its own.
pub fn validate_change(workspace: &Workspace, change_id: &str, strict: bool) -> Result<ValidationReport> {
    let deltas = workspace.change_delta_specs(change_id)?;
    if deltas.is_empty() {
        return Ok(ValidationReport::from_issues(
            vec![ValidationIssue {
                level: Level::Error,
                path: "specs".to_string(),
                message: format!("change '{change_id}' must have at least one delta spec"),
            }],
            strict,
        ));
    }

    let mut reports = Vec::with_capacity(deltas.len());
    for delta in &deltas {
        let text = std::fs::read_to_string(&delta.path)?;
        reports.push((
            format!("specs/{}/spec.md", delta.capability),
            validate_delta(&text, &delta.capability, strict),
        ));
    }
    Ok(ValidationReport::combine(
        reports.iter().map(|(p, r)| (p.as_str(), r.clone())),
        strict,
    ))
}

/// Validate one capability spec as stored on disk.
pub fn validate_stored_spec(
    workspace: &Workspace,
    capability: &str,
    strict: bool,
) -> Result<ValidationReport> {
    let text = workspace
        .read_spec(capability)?
        .ok_or_else(|| SpecdError::SpecNotFound(capability.to_string()))?;
    Ok(validate_spec(&text, capability, strict))
}

fn run_item(workspace: &Workspace, item: &BulkItem, strict: bool) -> BulkOutcome {
    let started = Instant::now();
    let result = match item.kind {
        ItemKind::Change => validate_change(workspace, &item.id, strict),
        ItemKind::Spec => validate_stored_spec(workspace, &item.id, strict),
    };
    let duration_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(report) => BulkOutcome {
            kind: item.kind,
            id: item.id.clone(),
            valid: report.valid,
            report: Some(report),
            error: None,
            duration_ms,
        },
        Err(e) => {
            tracing::warn!(id = %item.id, error = %e, "validation item failed");
            BulkOutcome {
                kind: item.kind,
                id: item.id.clone(),
                valid: false,
                report: None,
                error: Some(e.to_string()),
                duration_ms,
            }
        }
    }
}

/// Validate `items` with at most `concurrency` running at once. A failing
/// item never stops its siblings. Results are sorted by kind, then id.
pub fn validate_all(
    workspace: &Workspace,
    items: &[BulkItem],
    strict: bool,
    concurrency: usize,
) -> Result<BulkReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency.max(1))
        .thread_name(|i| format!("specd-validate-{i}"))
        .build()
        .map_err(|e| SpecdError::WorkerPool(e.to_string()))?;

    tracing::debug!(items = items.len(), concurrency, "starting bulk validation");
    let mut outcomes: Vec<BulkOutcome> = pool.install(|| {
        items
            .par_iter()
            .map(|item| run_item(workspace, item, strict))
            .collect()
    });
    outcomes.sort_by(|a, b| (a.kind, &a.id).cmp(&(b.kind, &b.id)));

    let passed = outcomes.iter().filter(|o| o.valid).count();
    let totals = BulkTotals {
        items: outcomes.len(),
        passed,
        failed: outcomes.len() - passed,
    };
    Ok(BulkReport {
        items: outcomes,
        totals,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
