use crate::output::{format_counts, print_json};
use anyhow::Context;
use serde::Serialize;
use specd_core::archive::{self, ArchiveReport};
use specd_core::config::Config;
use specd_core::merge::MergeOptions;
use specd_core::paths;
use specd_core::workspace::Workspace;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct ArchiveOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    specs: Option<ArchiveReport>,
    archived_to: PathBuf,
}

pub fn run(
    root: &Path,
    change_id: &str,
    skip_specs: bool,
    no_validate: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let workspace = Workspace::open(root).context("failed to open specd workspace")?;

    let today = chrono::Local::now().date_naive();
    let planned_dest = paths::archived_change_dir(root, today, change_id);
    if planned_dest.exists() {
        anyhow::bail!(
            "archive destination {} already exists; no files were changed",
            planned_dest.display()
        );
    }

    let report = if skip_specs {
        // Still resolve the change so a typo fails before anything moves.
        workspace
            .change_delta_specs(change_id)
            .with_context(|| format!("failed to read change '{change_id}'"))?;
        None
    } else {
        Some(update_specs(&workspace, change_id, no_validate, config.validation.strict)?)
    };

    let dest = workspace
        .archive_change(change_id, today)
        .with_context(|| format!("failed to move change '{change_id}' to the archive"))?;

    if json {
        return print_json(&ArchiveOutput {
            specs: report,
            archived_to: dest,
        });
    }

    match &report {
        Some(report) => print_report(report),
        None => println!("Skipped spec updates."),
    }
    let shown = dest.strip_prefix(root).unwrap_or(&dest);
    println!("Archived '{change_id}' to {}", shown.display());
    Ok(())
}

fn update_specs(
    workspace: &Workspace,
    change_id: &str,
    no_validate: bool,
    strict: bool,
) -> anyhow::Result<ArchiveReport> {
    let targets = workspace
        .archive_targets(change_id)
        .with_context(|| format!("failed to read change '{change_id}'"))?;
    if targets.is_empty() {
        anyhow::bail!("change '{change_id}' has no delta specs; use --skip-specs to archive it anyway");
    }

    let options = MergeOptions {
        skip_validation: no_validate,
        strict,
    };
    let plan = archive::prepare(change_id, &targets, &options).map_err(|abort| {
        anyhow::Error::new(abort).context(format!(
            "archive of '{change_id}' aborted; no files were changed"
        ))
    })?;

    plan.commit()
        .with_context(|| format!("failed to write specs for '{change_id}'"))
}

fn print_report(report: &ArchiveReport) {
    println!("Applying specs for '{}':", report.change_id);
    for target in &report.targets {
        let verb = if target.created { "create" } else { "update" };
        println!("  {verb} {}: {}", target.capability, format_counts(&target.counts));
        for w in &target.warnings {
            println!("    [warning] {w}");
        }
    }
    if report.totals.total() == 0 {
        println!("Totals: no requirement changes");
    } else {
        println!("Totals: {}", format_counts(&report.totals));
    }
}
