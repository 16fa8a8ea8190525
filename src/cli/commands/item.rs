//! Item mutation commands: add, resolve, start, reopen, edit.

use serde::Serialize;

use super::{item_line, now, open, print_json, push_note, runtime};
use crate::cli::{AddArgs, EditArgs};
use crate::config::Settings;
use crate::error::Result;
use crate::model::{TodoStatus, TrackedItem};
use crate::store::ItemPatch;
use crate::sync::Committed;

#[derive(Serialize)]
struct ItemOutput<'a> {
    item: &'a TrackedItem,
    #[serde(flatten)]
    committed: &'a Committed,
}

fn report(item: &TrackedItem, committed: &Committed, verb: &str, json: bool) -> Result<()> {
    if json {
        return print_json(&ItemOutput { item, committed });
    }
    println!("{verb}: {}", item_line(item));
    if let Some(note) = push_note(committed) {
        println!("{note}");
    }
    Ok(())
}

/// Execute add command.
pub fn execute_add(settings: &Settings, args: &AddArgs, json: bool) -> Result<()> {
    let rt = runtime()?;
    let mut coordinator = open(settings)?;
    let (item, committed) =
        rt.block_on(coordinator.add_manual(&args.text, &args.file, args.line, now()))?;
    report(&item, &committed, "Added", json)
}

/// Execute resolve/start/reopen.
pub fn execute_status(settings: &Settings, id: &str, status: TodoStatus, json: bool) -> Result<()> {
    let rt = runtime()?;
    let mut coordinator = open(settings)?;
    let (item, committed) = rt.block_on(coordinator.set_status(id, status, now()))?;
    let verb = match status {
        TodoStatus::Open => "Reopened",
        TodoStatus::InProgress => "Started",
        TodoStatus::Resolved => "Resolved",
    };
    report(&item, &committed, verb, json)
}

/// Execute edit command.
pub fn execute_edit(settings: &Settings, args: &EditArgs, json: bool) -> Result<()> {
    let patch = ItemPatch {
        text: args.text.clone(),
        status: args.status.clone(),
        priority: args.priority.clone(),
        labels: (!args.labels.is_empty()).then(|| args.labels.clone()),
        deadline: args.deadline.clone(),
        urgency_score: args.urgency,
        line: args.line,
    };

    let rt = runtime()?;
    let mut coordinator = open(settings)?;
    let (item, committed) = rt.block_on(coordinator.apply_edit(&args.id, &patch, now()))?;
    report(&item, &committed, "Updated", json)
}
