//! Command implementations.

pub mod completions;
pub mod item;
pub mod list;
pub mod remind;
pub mod scan;
pub mod status;
pub mod sync;

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use tracing::warn;

use crate::config::Settings;
use crate::enrich::HttpEnricher;
use crate::error::{Error, Result};
use crate::model::TrackedItem;
use crate::sync::{Committed, HttpRemoteStore, PushOutcome, SyncCoordinator};

/// The coordinator wired to the HTTP backend.
pub type Coordinator = SyncCoordinator<HttpRemoteStore, HttpEnricher>;

/// Open the coordinator for the resolved workspace.
pub fn open(settings: &Settings) -> Result<Coordinator> {
    let remote = HttpRemoteStore::new(&settings.backend_url, settings.timeout);
    let enricher = settings
        .enrich
        .then(|| HttpEnricher::new(&settings.backend_url, settings.timeout));
    let coordinator = SyncCoordinator::open(
        &settings.workspace,
        &settings.workspace_name,
        &settings.global_dir,
        remote,
        enricher,
        now(),
    )?
    .with_offline(settings.offline);

    for path in coordinator.quarantined() {
        warn!(path = %path.display(), "Corrupt database moved aside");
    }
    Ok(coordinator)
}

/// Single-threaded runtime for one command.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))
}

#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

/// One-line human rendering of an item.
pub(crate) fn item_line(item: &TrackedItem) -> String {
    let status = match item.status {
        crate::model::TodoStatus::Open => "○".normal(),
        crate::model::TodoStatus::InProgress => "◐".yellow(),
        crate::model::TodoStatus::Resolved => "●".green(),
    };
    let priority = item
        .priority
        .map(|p| format!("[{}]", p.as_str()))
        .unwrap_or_default();
    let location = if item.file_path.is_empty() {
        String::new()
    } else {
        format!("{}:{}", item.file_path, item.line)
    };
    format!(
        "{status} {} {} {} {}",
        item.short_id().dimmed(),
        priority.cyan(),
        item.text,
        location.dimmed()
    )
}

/// Human note on what a commit did with the remote.
pub(crate) fn push_note(committed: &Committed) -> Option<String> {
    match &committed.push {
        PushOutcome::Pushed => Some("pushed to remote".green().to_string()),
        PushOutcome::Failed { reason } => {
            Some(format!("{} {reason}", "not pushed:".yellow()))
        }
        PushOutcome::Unchanged | PushOutcome::NotBound | PushOutcome::Disabled => None,
    }
}
