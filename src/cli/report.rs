//! Run summary output

use std::path::Path;

use colored::Colorize;

use crate::assembler::AssemblyReport;
use crate::progress::format_bytes;

pub fn print(report: &AssemblyReport, output: &Path) {
    let package = &report.package;
    let manifest = &report.manifest;

    println!();
    println!("{}", "-----------------------------------".dimmed());
    println!(":: {}", package.display_name.bold());
    if !package.summary.is_empty() {
        println!(" : {}", package.summary);
    }
    println!(":: Project ID: {}", package.uid.to_string().cyan());
    if let Some(version) = &manifest.version {
        println!(":: Version:    {}", version);
    }
    if let Some(author) = &manifest.author {
        println!(":: Author:     {}", author);
    }
    println!("{}", "-----------------------------------".dimmed());
    println!();

    let total_bytes: u64 = report.resolved.iter().map(|f| f.length).sum();
    println!(
        "  {} {} ({})",
        "✓".green(),
        report.archive.file_name.bold(),
        format_bytes(report.archive.length)
    );
    println!(
        "  {} {} of {} mods installed ({})",
        "✓".green(),
        report.copied,
        manifest.files.len(),
        format_bytes(total_bytes)
    );
    println!("  {} {} override files merged", "✓".green(), report.overrides);

    for skipped in &report.skipped {
        let mark = if skipped.required { "✗".red() } else { "-".yellow() };
        println!(
            "  {} project {} file {} - {}",
            mark,
            skipped.project_id,
            skipped.file_id.to_string().bold(),
            skipped.reason.red()
        );
    }

    println!();
    println!(
        "{} Modpack ready in {}",
        "✓".green().bold(),
        output.display().to_string().cyan()
    );
}
