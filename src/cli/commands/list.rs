//! List command implementation.

use super::{item_line, open, print_json};
use crate::cli::ListArgs;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::identity::normalize_path;
use crate::model::{TodoStatus, TrackedItem};

/// Execute list command.
pub fn execute(settings: &Settings, args: &ListArgs, json: bool) -> Result<()> {
    let coordinator = open(settings)?;
    let store = coordinator.store();

    let status: Option<TodoStatus> = args
        .status
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(Error::InvalidArgument)?;
    let file = args.file.as_deref().map(normalize_path);

    let mut items: Vec<&TrackedItem> = if args.all || status == Some(TodoStatus::Resolved) {
        let mut all: Vec<_> = store.items().collect();
        all.sort_by(|a, b| a.file_path.cmp(&b.file_path).then(a.line.cmp(&b.line)));
        all
    } else {
        store.open_items()
    };
    items.retain(|i| status.is_none_or(|s| i.status == s));
    items.retain(|i| file.as_deref().is_none_or(|f| i.file_path == f));

    if json {
        return print_json(&items);
    }

    if items.is_empty() {
        println!("No items.");
        return Ok(());
    }
    for item in &items {
        println!("{}", item_line(item));
    }
    println!();
    println!("{} item(s)", items.len());
    Ok(())
}
