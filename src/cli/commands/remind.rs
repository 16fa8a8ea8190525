//! Remind command implementation.

use chrono::Duration;
use serde_json::json;

use super::{now, open, print_json};
use crate::cli::RemindArgs;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::reminder::{format_reminder, ReminderScheduler};
use crate::scan::relative_path;
use crate::storage::WorkspaceStorage;

/// Execute remind command.
pub fn execute(settings: &Settings, args: &RemindArgs, json: bool) -> Result<()> {
    let coordinator = open(settings)?;
    let store = coordinator.store();
    let state_dir = WorkspaceStorage::new(&settings.workspace).dir();
    let mut scheduler = ReminderScheduler::load(&state_dir);
    let now = now();

    if let Some(id) = &args.snooze {
        if args.minutes <= 0 {
            return Err(Error::InvalidArgument("snooze minutes must be positive".into()));
        }
        let id = store.resolve_id(id)?;
        scheduler.snooze(&id, now, Duration::minutes(args.minutes));
        scheduler.save(&state_dir)?;
        if json {
            return print_json(&json!({ "snoozed": id, "minutes": args.minutes }));
        }
        println!("Snoozed {} for {} minute(s)", &id[..id.len().min(8)], args.minutes);
        return Ok(());
    }

    let file = relative_path(&settings.workspace, std::path::Path::new(&args.file))?;
    let reminder = scheduler.next_for_file(store.items(), &file, now);
    let message = reminder.map(format_reminder);
    let reminder = reminder.cloned();
    scheduler.retain_ids(store.items().map(|i| i.id.as_str()));
    scheduler.save(&state_dir)?;

    if json {
        return print_json(&json!({ "reminder": reminder, "message": message }));
    }
    match message {
        Some(text) => println!("{text}"),
        None => println!("Nothing to remind about in {file}."),
    }
    Ok(())
}
