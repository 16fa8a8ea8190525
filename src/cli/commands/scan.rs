//! Scan command implementation.

use std::path::Path;

use serde::Serialize;

use super::{now, open, print_json, push_note, runtime};
use crate::config::Settings;
use crate::error::Result;
use crate::scan::LineScanner;
use crate::store::UpsertStats;
use crate::sync::Committed;

#[derive(Serialize)]
struct ScanOutput {
    files: usize,
    #[serde(flatten)]
    stats: UpsertStats,
    #[serde(flatten)]
    committed: Committed,
}

/// Execute scan command.
pub fn execute(settings: &Settings, file: Option<&Path>, json: bool) -> Result<()> {
    let rt = runtime()?;
    let mut coordinator = open(settings)?;

    let (stats, files, committed) = rt.block_on(async {
        match file {
            Some(path) => coordinator
                .on_file_saved(&LineScanner, path, None, now())
                .await
                .map(|(stats, committed)| (stats, 1, committed)),
            None => {
                coordinator
                    .scan_workspace(&LineScanner, &settings.exclude, now())
                    .await
            }
        }
    })?;

    if json {
        return print_json(&ScanOutput {
            files,
            stats,
            committed,
        });
    }

    println!(
        "Scanned {files} file(s): {} new, {} unchanged, {} auto-resolved, {} manual kept",
        stats.inserted, stats.carried, stats.auto_resolved, stats.kept_manual
    );
    if committed.enriched > 0 {
        println!("Enriched {} item(s)", committed.enriched);
    }
    println!("Saved to {} storage", committed.storage);
    if let Some(note) = push_note(&committed) {
        println!("{note}");
    }
    Ok(())
}
