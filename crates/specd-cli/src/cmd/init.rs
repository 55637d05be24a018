use crate::output::print_json;
use anyhow::Context;
use specd_core::{paths, workspace::Workspace};
use std::path::Path;

pub fn run(root: &Path, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let project_name = match name {
        Some(n) => n.to_string(),
        None => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string()),
    };

    let (workspace, created) = Workspace::init(root, &project_name)
        .with_context(|| format!("failed to initialize specd in {}", root.display()))?;

    if json {
        print_json(&serde_json::json!({
            "root": workspace.root(),
            "project": project_name,
            "config_created": created,
        }))?;
        return Ok(());
    }

    println!("Initializing specd in: {}", workspace.root().display());
    for dir in [paths::SPECS_DIR, paths::CHANGES_DIR, paths::ARCHIVE_DIR] {
        println!("  ensured: {dir}/");
    }
    if created {
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }
    println!("\nNext: create a change under {}/<change-id>/specs/<capability>/spec.md", paths::CHANGES_DIR);
    Ok(())
}
