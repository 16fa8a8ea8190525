//! Sync, projects and binding command implementations.

use colored::Colorize;
use serde_json::json;

use super::{now, open, print_json, runtime};
use crate::cli::{BindingCommands, SyncArgs};
use crate::config::Settings;
use crate::error::Result;
use crate::sync::{BindingChoice, SyncOutcome};

/// Execute sync command.
pub fn execute(settings: &Settings, args: &SyncArgs, json: bool) -> Result<()> {
    let choice = match (&args.create, &args.project) {
        (Some(name), _) => Some(BindingChoice::Create(name.clone())),
        (None, Some(id)) => Some(BindingChoice::Existing(id.clone())),
        (None, None) => None,
    };

    let rt = runtime()?;
    let mut coordinator = open(settings)?;
    let outcome = rt.block_on(coordinator.sync(choice, now()))?;

    if json {
        return print_json(&outcome);
    }

    match outcome {
        SyncOutcome::Synced(report) => {
            println!(
                "{} {} ({})",
                "Synced".green(),
                report.project_name,
                report.project_id.dimmed()
            );
            let m = &report.merge;
            println!(
                "  {} pulled, {} kept local, {} identical",
                m.local_changes(),
                m.local_only + m.local_won,
                m.identical
            );
            if !report.rejected.is_empty() {
                println!(
                    "  {} {} remote item(s) rejected:",
                    "warning:".yellow(),
                    report.rejected.len()
                );
                for reason in &report.rejected {
                    println!("    {reason}");
                }
            }
            println!(
                "  {}; saved to {} storage",
                if report.pushed { "pushed" } else { "nothing to push" },
                report.storage
            );
        }
        SyncOutcome::Offline { reason } => {
            println!("{} {reason}", "Offline:".yellow());
            println!("Local state is unchanged. Run `bbt sync` again when the backend is reachable.");
        }
        SyncOutcome::Skipped => println!("A sync is already running; skipped."),
    }
    Ok(())
}

/// Execute projects command.
pub fn execute_projects(settings: &Settings, json: bool) -> Result<()> {
    let rt = runtime()?;
    let coordinator = open(settings)?;
    let projects = rt.block_on(coordinator.list_remote_projects())?;
    let bound = coordinator.binding().map(|b| b.project_id.clone());

    if json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        println!("No remote projects.");
        return Ok(());
    }
    for project in &projects {
        let marker = if bound.as_deref() == Some(project.project_id.as_str()) {
            "*".green().to_string()
        } else {
            " ".to_string()
        };
        println!("{marker} {}  {}", project.project_id.dimmed(), project.project_name);
    }
    Ok(())
}

/// Execute binding command.
pub fn execute_binding(
    settings: &Settings,
    command: Option<BindingCommands>,
    json: bool,
) -> Result<()> {
    let mut coordinator = open(settings)?;
    match command.unwrap_or(BindingCommands::Show) {
        BindingCommands::Show => {
            let binding = coordinator.binding();
            if json {
                return print_json(&json!({ "binding": binding }));
            }
            match binding {
                Some(b) => {
                    println!("Workspace: {}", b.workspace_path);
                    println!("Project:   {} ({})", b.project_name, b.project_id.dimmed());
                    println!("Bound at:  {}", b.bound_at.format("%Y-%m-%d %H:%M:%S UTC"));
                }
                None => println!("This workspace is not bound to a remote project."),
            }
        }
        BindingCommands::Clear => {
            let removed = coordinator.clear_binding()?;
            if json {
                return print_json(&json!({ "cleared": removed }));
            }
            match removed {
                Some(b) => println!("Cleared binding to {} ({})", b.project_name, b.project_id),
                None => println!("This workspace was not bound."),
            }
        }
    }
    Ok(())
}
