//! Last-writer-wins merge keyed by item id.
//!
//! For an id present on one side only, that side's copy is taken. For an id
//! present on both, the strictly newer `updatedAt` wins and an exact tie goes
//! to the remote (canonical) copy.
//!
//! The result is idempotent and associative. It is commutative whenever the
//! two copies of a tied id carry identical content; with differing content
//! the tie rule deliberately favors the remote side.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::TrackedItem;

/// How each id was decided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub local_only: usize,
    pub remote_only: usize,
    pub local_won: usize,
    pub remote_won: usize,
    /// Present on both sides with identical content.
    pub identical: usize,
}

impl MergeStats {
    /// Number of ids whose local copy was replaced or added from remote.
    #[must_use]
    pub const fn local_changes(&self) -> usize {
        self.remote_only + self.remote_won
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.local_only + self.remote_only + self.local_won + self.remote_won + self.identical
    }
}

/// Result of [`merge`]: items in id order plus statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub items: Vec<TrackedItem>,
    pub stats: MergeStats,
}

/// Merge two item sets.
///
/// Duplicate ids within one side are first reduced with the same rule.
#[must_use]
pub fn merge(local: &[TrackedItem], remote: &[TrackedItem]) -> MergeOutcome {
    let local = reduce(local);
    let mut remote = reduce(remote);
    let mut stats = MergeStats::default();
    let mut merged: BTreeMap<String, TrackedItem> = BTreeMap::new();

    for (id, mine) in local {
        let winner = match remote.remove(&id) {
            None => {
                stats.local_only += 1;
                mine
            }
            Some(theirs) if theirs == mine => {
                stats.identical += 1;
                theirs
            }
            Some(theirs) if mine.updated_at > theirs.updated_at => {
                stats.local_won += 1;
                mine
            }
            Some(theirs) => {
                stats.remote_won += 1;
                theirs
            }
        };
        merged.insert(id, winner);
    }

    for (id, theirs) in remote {
        stats.remote_only += 1;
        merged.insert(id, theirs);
    }

    MergeOutcome {
        items: merged.into_values().collect(),
        stats,
    }
}

/// Collapse duplicate ids, keeping the later `updatedAt` (later entry on tie).
fn reduce(items: &[TrackedItem]) -> BTreeMap<String, TrackedItem> {
    let mut by_id: BTreeMap<String, TrackedItem> = BTreeMap::new();
    for item in items {
        match by_id.get(&item.id) {
            Some(kept) if kept.updated_at > item.updated_at => {}
            _ => {
                by_id.insert(item.id.clone(), item.clone());
            }
        }
    }
    by_id
}
