//! Status command implementation.

use colored::Colorize;

use super::{open, print_json};
use crate::config::Settings;
use crate::error::Result;

/// Execute status command.
pub fn execute(settings: &Settings, json: bool) -> Result<()> {
    let coordinator = open(settings)?;
    let status = coordinator.status();

    if json {
        return print_json(&status);
    }

    println!("{}", "Busy Bee Status".bold());
    println!("===============");
    println!();
    println!("Workspace: {}", status.workspace);
    println!("Project:   {} ({})", status.project_name, status.project_id.dimmed());
    match &status.binding {
        Some(binding) => println!(
            "Bound:     {} since {}",
            binding.project_name.green(),
            binding.bound_at.format("%Y-%m-%d %H:%M")
        ),
        None => println!("Bound:     {}", "no (run `bbt sync --create NAME`)".yellow()),
    }
    println!("Backend:   {}", settings.backend_url);
    println!();

    println!("Storage:   {}", status.storage);
    for (mode, path) in &status.storage_paths {
        println!("  {:<9} {}", mode.to_string(), path.display().to_string().dimmed());
    }
    for path in &status.quarantined {
        println!("  {} {}", "quarantined".red(), path.display());
    }
    println!();

    println!("Items:     {}", status.total);
    println!("  Open:        {}", status.open);
    println!("  In progress: {}", status.in_progress);
    println!("  Resolved:    {}", status.resolved);
    println!();

    match status.last_synced_at {
        Some(at) => println!("Last sync: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last sync: never"),
    }
    if status.pending_push && status.binding.is_some() {
        println!("{}", "Local changes not yet pushed.".yellow());
    }

    Ok(())
}
