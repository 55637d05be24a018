use serde::Serialize;
use specd_core::merge::MergeCounts;
use specd_core::validate::{Level, ValidationReport};

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    // Calculate column widths
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  "));

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}

/// `+ 1 added, ~ 0 modified, - 2 removed, → 0 renamed`
pub fn format_counts(counts: &MergeCounts) -> String {
    format!(
        "+ {} added, ~ {} modified, - {} removed, → {} renamed",
        counts.added, counts.modified, counts.removed, counts.renamed
    )
}

pub fn print_issues(report: &ValidationReport) {
    for issue in &report.issues {
        let prefix = match issue.level {
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Info => "info",
        };
        if issue.path.is_empty() {
            println!("  [{prefix}] {}", issue.message);
        } else {
            println!("  [{prefix}] {}: {}", issue.path, issue.message);
        }
    }
}
