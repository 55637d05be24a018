use crate::output::{print_issues, print_json};
use anyhow::Context;
use serde::Serialize;
use specd_core::bulk::{self, BulkItem, BulkReport, ItemKind};
use specd_core::config::Config;
use specd_core::validate::ValidationReport;
use specd_core::workspace::Workspace;
use std::path::Path;

pub struct ValidateArgs {
    pub item: Option<String>,
    pub all: bool,
    pub changes: bool,
    pub specs: bool,
    pub strict: bool,
    pub concurrency: Option<usize>,
}

#[derive(Serialize)]
struct SingleOutput<'a> {
    kind: ItemKind,
    id: &'a str,
    #[serde(flatten)]
    report: &'a ValidationReport,
}

pub fn run(root: &Path, args: ValidateArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let workspace = Workspace::open(root).context("failed to open specd workspace")?;
    let strict = args.strict || config.validation.strict;

    if let Some(item) = args.item.as_deref() {
        return validate_one(&workspace, item, strict, json);
    }

    // No selector means everything.
    let (changes, specs) = if args.all || (!args.changes && !args.specs) {
        (true, true)
    } else {
        (args.changes, args.specs)
    };
    let concurrency = args.concurrency.unwrap_or(config.validation.concurrency);
    if concurrency == 0 {
        anyhow::bail!("--concurrency must be at least 1");
    }

    let items = bulk::collect_items(&workspace, changes, specs)?;
    let report = bulk::validate_all(&workspace, &items, strict, concurrency)
        .context("bulk validation failed")?;

    if json {
        print_json(&report)?;
    } else {
        print_bulk(&report);
    }

    if !report.all_valid() {
        anyhow::bail!("{} of {} item(s) failed validation", report.totals.failed, report.totals.items);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Single item
// ---------------------------------------------------------------------------

fn validate_one(workspace: &Workspace, item: &str, strict: bool, json: bool) -> anyhow::Result<()> {
    // A change takes precedence over a spec with the same name.
    let resolved = if workspace.change_exists(item) {
        BulkItem::change(item)
    } else if workspace.read_spec(item)?.is_some() {
        BulkItem::spec(item)
    } else {
        anyhow::bail!("no change or spec named '{item}'");
    };

    let report = match resolved.kind {
        ItemKind::Change => bulk::validate_change(workspace, item, strict),
        ItemKind::Spec => bulk::validate_stored_spec(workspace, item, strict),
    }
    .with_context(|| format!("failed to validate '{item}'"))?;

    if json {
        print_json(&SingleOutput {
            kind: resolved.kind,
            id: item,
            report: &report,
        })?;
    } else {
        print_item_line(resolved.kind, item, report.valid);
        print_issues(&report);
    }

    if !report.valid {
        anyhow::bail!("'{item}' failed validation");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Text output
// ---------------------------------------------------------------------------

fn kind_label(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Change => "change",
        ItemKind::Spec => "spec",
    }
}

fn print_item_line(kind: ItemKind, id: &str, valid: bool) {
    let mark = if valid { "✓" } else { "✗" };
    println!("{mark} {} {id}", kind_label(kind));
}

fn print_bulk(report: &BulkReport) {
    if report.items.is_empty() {
        println!("Nothing to validate.");
        return;
    }
    for outcome in &report.items {
        print_item_line(outcome.kind, &outcome.id, outcome.valid);
        if let Some(r) = &outcome.report {
            print_issues(r);
        }
        if let Some(e) = &outcome.error {
            println!("  [error] {e}");
        }
    }
    println!(
        "\nTotals: {} item(s), {} passed, {} failed",
        report.totals.items, report.totals.passed, report.totals.failed
    );
}
