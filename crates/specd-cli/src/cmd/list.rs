use crate::output::{print_json, print_table};
use anyhow::Context;
use serde::Serialize;
use specd_core::document::SpecDocument;
use specd_core::workspace::Workspace;
use std::path::Path;

#[derive(Serialize)]
struct ChangeRow {
    id: String,
    deltas: usize,
}

#[derive(Serialize)]
struct SpecRow {
    capability: String,
    /// `None` when the document has no Requirements section.
    requirements: Option<usize>,
}

pub fn run(root: &Path, specs: bool, json: bool) -> anyhow::Result<()> {
    let workspace = Workspace::open(root).context("failed to open specd workspace")?;
    if specs {
        list_specs(&workspace, json)
    } else {
        list_changes(&workspace, json)
    }
}

fn list_changes(workspace: &Workspace, json: bool) -> anyhow::Result<()> {
    let mut rows = Vec::new();
    for id in workspace.list_changes().context("failed to list changes")? {
        let deltas = workspace
            .change_delta_specs(&id)
            .with_context(|| format!("failed to read change '{id}'"))?
            .len();
        rows.push(ChangeRow { id, deltas });
    }

    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No active changes.");
        return Ok(());
    }
    print_table(
        &["CHANGE", "DELTAS"],
        rows.into_iter()
            .map(|r| vec![r.id, r.deltas.to_string()])
            .collect(),
    );
    Ok(())
}

fn list_specs(workspace: &Workspace, json: bool) -> anyhow::Result<()> {
    let mut rows = Vec::new();
    for capability in workspace.list_specs().context("failed to list specs")? {
        let text = workspace.read_spec(&capability)?.unwrap_or_default();
        let requirements = SpecDocument::decompose(&text)
            .ok()
            .map(|doc| doc.body_blocks.len());
        rows.push(SpecRow {
            capability,
            requirements,
        });
    }

    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No specs.");
        return Ok(());
    }
    print_table(
        &["SPEC", "REQUIREMENTS"],
        rows.into_iter()
            .map(|r| {
                let count = r
                    .requirements
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string());
                vec![r.capability, count]
            })
            .collect(),
    );
    Ok(())
}
