//! In-memory working set for one project.
//!
//! The store owns the [`ProjectDatabase`] between load and save and enforces
//! the override rules: a person's edit always outranks a re-derivation from
//! the file, `source` only moves from `scan` to `manual`, items are never
//! hard-deleted, and `updatedAt` never moves backwards.
//!
//! All mutating methods take `now` so callers (and tests) control the clock.

mod patch;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::enrich::Enrichment;
use crate::error::{Error, Result};
use crate::identity::{normalize_path, stable_id};
use crate::model::{ItemSource, Priority, ProjectDatabase, TodoStatus, TrackedItem};
use crate::validate::{find_similar_ids, validate_text};

pub use patch::ItemPatch;

/// Counts reported by [`TodoStore::upsert_from_file`] and [`TodoStore::replace_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertStats {
    /// New ids inserted.
    pub inserted: usize,
    /// Scan items seen again; status and enrichment carried over.
    pub carried: usize,
    /// Manual items left untouched apart from `updatedAt`.
    pub kept_manual: usize,
    /// Scan items no longer present in their file, now resolved.
    pub auto_resolved: usize,
}

impl UpsertStats {
    fn absorb(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.carried += other.carried;
        self.kept_manual += other.kept_manual;
        self.auto_resolved += other.auto_resolved;
    }

    /// True when the upsert changed the database.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.inserted + self.kept_manual + self.auto_resolved > 0
    }
}

/// The authoritative working set for one project.
#[derive(Debug, Clone)]
pub struct TodoStore {
    db: ProjectDatabase,
}

impl TodoStore {
    #[must_use]
    pub fn new(db: ProjectDatabase) -> Self {
        Self { db }
    }

    /// A store over a fresh, empty database.
    #[must_use]
    pub fn empty(project_id: &str, project_name: &str, now: DateTime<Utc>) -> Self {
        Self::new(ProjectDatabase::new(project_id, project_name, now))
    }

    #[must_use]
    pub fn database(&self) -> &ProjectDatabase {
        &self.db
    }

    /// Mutable access for sync bookkeeping (`backendSyncInfo`).
    pub fn database_mut(&mut self) -> &mut ProjectDatabase {
        &mut self.db
    }

    #[must_use]
    pub fn into_database(self) -> ProjectDatabase {
        self.db
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        self.db.project_id()
    }

    // ── Queries ──────────────────────────────────────────────

    /// All items in id order.
    pub fn items(&self) -> impl Iterator<Item = &TrackedItem> {
        self.db.items()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.db.todos.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.db.todos.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TrackedItem> {
        self.db.todos.get(id)
    }

    /// Items recorded for `file_path`, ordered by line.
    #[must_use]
    pub fn items_for_file(&self, file_path: &str) -> Vec<&TrackedItem> {
        let path = normalize_path(file_path);
        let mut items: Vec<_> = self.db.items().filter(|i| i.file_path == path).collect();
        items.sort_by_key(|i| i.line);
        items
    }

    /// Items that are not resolved, most pressing first.
    #[must_use]
    pub fn open_items(&self) -> Vec<&TrackedItem> {
        let mut items: Vec<_> = self.db.items().filter(|i| !i.is_resolved()).collect();
        items.sort_by(|a, b| {
            Priority::rank(b.priority)
                .cmp(&Priority::rank(a.priority))
                .then_with(|| {
                    b.urgency_score
                        .unwrap_or(0.0)
                        .total_cmp(&a.urgency_score.unwrap_or(0.0))
                })
                .then_with(|| a.file_path.cmp(&b.file_path))
                .then_with(|| a.line.cmp(&b.line))
        });
        items
    }

    /// Resolve a full id or a unique id prefix.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound`/`ItemNotFoundSimilar` when nothing matches and
    /// `InvalidArgument` when a prefix is ambiguous.
    pub fn resolve_id(&self, id_or_prefix: &str) -> Result<String> {
        let needle = id_or_prefix.trim().to_lowercase();
        if self.db.todos.contains_key(&needle) {
            return Ok(needle);
        }

        let matches: Vec<&String> = if needle.is_empty() {
            Vec::new()
        } else {
            self.db.todos.keys().filter(|id| id.starts_with(&needle)).collect()
        };
        match matches.as_slice() {
            [only] => Ok((*only).clone()),
            [] => {
                let ids: Vec<String> = self.db.todos.keys().cloned().collect();
                let similar = find_similar_ids(&needle, &ids, 3);
                if similar.is_empty() {
                    Err(Error::ItemNotFound {
                        id: id_or_prefix.to_string(),
                    })
                } else {
                    Err(Error::ItemNotFoundSimilar {
                        id: id_or_prefix.to_string(),
                        similar: similar.iter().map(|s| s.chars().take(8).collect()).collect(),
                    })
                }
            }
            many => Err(Error::InvalidArgument(format!(
                "id prefix '{id_or_prefix}' is ambiguous ({} items match)",
                many.len()
            ))),
        }
    }

    // ── Scan upserts ─────────────────────────────────────────

    /// Apply a fresh scan of one file.
    ///
    /// For items already recorded under `file_path`:
    /// - manual items are kept verbatim; only `updatedAt` advances and a
    ///   fresh item with the same id never replaces them
    /// - scan items seen again keep status, enrichment and `createdAt`
    /// - scan items no longer in the file are auto-resolved
    ///
    /// Fresh items with unknown ids are inserted.
    pub fn upsert_from_file(
        &mut self,
        file_path: &str,
        fresh: Vec<TrackedItem>,
        now: DateTime<Utc>,
    ) -> UpsertStats {
        let path = normalize_path(file_path);
        let mut stats = UpsertStats::default();
        let mut dirty = false;

        let mut incoming: BTreeMap<String, TrackedItem> = BTreeMap::new();
        for item in fresh {
            incoming.entry(item.id.clone()).or_insert(item);
        }

        let existing_ids: Vec<String> = self
            .db
            .items()
            .filter(|i| i.file_path == path)
            .map(|i| i.id.clone())
            .collect();

        for id in existing_ids {
            let Some(existing) = self.db.todos.get_mut(&id) else {
                continue;
            };
            let seen = incoming.remove(&id);

            if existing.is_manual() {
                existing.touch(now);
                stats.kept_manual += 1;
                continue;
            }

            match seen {
                Some(fresh) => {
                    if existing.text != fresh.text {
                        existing.text = fresh.text;
                        existing.touch(now);
                        dirty = true;
                    }
                    if existing.is_resolved() && existing.extra.remove("autoResolved").is_some() {
                        // Came back after being auto-resolved.
                        existing.status = TodoStatus::Open;
                        existing.touch(now);
                        dirty = true;
                    }
                    stats.carried += 1;
                }
                None if !existing.is_resolved() => {
                    existing.status = TodoStatus::Resolved;
                    existing
                        .extra
                        .insert("autoResolved".into(), serde_json::Value::Bool(true));
                    existing.touch(now);
                    stats.auto_resolved += 1;
                }
                None => {}
            }
        }

        for (id, item) in incoming {
            // Ids are path-scoped, but a stray fresh item for another file
            // must still not clobber what is recorded under that id.
            if self.db.todos.contains_key(&id) {
                continue;
            }
            self.db.todos.insert(id, item);
            stats.inserted += 1;
        }

        if dirty || stats.any() {
            self.db.touch(now);
        }
        debug!(file = %path, ?stats, "Upserted scan results");
        stats
    }

    /// Apply a full-workspace scan.
    ///
    /// Files that produced no items have their open scan items auto-resolved.
    /// Files in `skipped` were present but unreadable, so their items stay as
    /// they are.
    pub fn replace_all(
        &mut self,
        scanned: Vec<TrackedItem>,
        skipped: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> UpsertStats {
        let mut by_file: BTreeMap<String, Vec<TrackedItem>> = BTreeMap::new();
        for item in scanned {
            by_file.entry(item.file_path.clone()).or_default().push(item);
        }

        let stale_files: BTreeSet<String> = self
            .db
            .items()
            .filter(|i| i.source == ItemSource::Scan && !i.is_resolved())
            .filter(|i| !by_file.contains_key(&i.file_path) && !skipped.contains(&i.file_path))
            .map(|i| i.file_path.clone())
            .collect();
        for file in stale_files {
            by_file.insert(file, Vec::new());
        }

        let mut stats = UpsertStats::default();
        for (file, items) in by_file {
            stats.absorb(self.upsert_from_file(&file, items, now));
        }
        stats
    }

    /// Re-derive every id under a new project id.
    ///
    /// Used once, when a workspace is first bound to a remote project, so
    /// that ids agree with other clients bound to the same project. Two
    /// items can derive the same id when one was reworded by hand; the most
    /// recently updated one takes it and the other keeps its previous id.
    pub fn rekey(&mut self, project_id: &str, project_name: &str, now: DateTime<Utc>) {
        if self.db.meta.project_id == project_id && self.db.meta.project_name == project_name {
            return;
        }
        let mut items: Vec<TrackedItem> = std::mem::take(&mut self.db.todos).into_values().collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let mut rekeyed: BTreeMap<String, TrackedItem> = BTreeMap::new();
        for mut item in items {
            let derived = stable_id(project_id, &item.file_path, item.line, &item.text);
            let id = if rekeyed.contains_key(&derived) {
                warn!(id = %item.id, derived = %derived, "Re-derived id already taken; keeping previous id");
                free_id(&rekeyed, &item.id)
            } else {
                derived
            };
            item.id.clone_from(&id);
            rekeyed.insert(id, item);
        }
        self.db.todos = rekeyed;
        self.db.meta.project_id = project_id.to_string();
        self.db.meta.project_name = project_name.to_string();
        self.db.touch(now);
    }

    /// Replace the item set wholesale (merge results).
    pub fn set_items(&mut self, items: Vec<TrackedItem>, now: DateTime<Utc>) {
        self.db.set_items(items);
        self.db.touch(now);
    }

    // ── Manual mutations ─────────────────────────────────────

    /// Create a manual item.
    ///
    /// If the stable id already exists the existing item is promoted to
    /// `manual` instead of being duplicated.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for empty text or a zero line number.
    pub fn add_manual(
        &mut self,
        text: &str,
        file_path: &str,
        line: u32,
        now: DateTime<Utc>,
    ) -> Result<&TrackedItem> {
        let text = validate_text(text).map_err(Error::Validation)?;
        if line == 0 {
            return Err(Error::Validation("line must be at least 1".into()));
        }

        let item = TrackedItem::manual(self.db.project_id(), file_path, line, &text, now);
        let id = item.id.clone();
        match self.db.todos.get_mut(&id) {
            Some(existing) => {
                existing.source = ItemSource::Manual;
                existing.touch(now);
            }
            None => {
                self.db.todos.insert(id.clone(), item);
            }
        }
        self.db.touch(now);
        self.get_resolved(&id)
    }

    /// Set the status of an item. Re-applying the current status only
    /// advances `updatedAt`.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound` if the id does not resolve.
    pub fn set_status(&mut self, id: &str, status: TodoStatus, now: DateTime<Utc>) -> Result<&TrackedItem> {
        let id = self.resolve_id(id)?;
        if let Some(item) = self.db.todos.get_mut(&id) {
            item.status = status;
            item.extra.remove("autoResolved");
            item.touch(now);
        }
        self.db.touch(now);
        self.get_resolved(&id)
    }

    /// # Errors
    ///
    /// Returns `ItemNotFound` if the id does not resolve.
    pub fn mark_resolved(&mut self, id: &str, now: DateTime<Utc>) -> Result<&TrackedItem> {
        self.set_status(id, TodoStatus::Resolved, now)
    }

    /// # Errors
    ///
    /// Returns `ItemNotFound` if the id does not resolve.
    pub fn mark_in_progress(&mut self, id: &str, now: DateTime<Utc>) -> Result<&TrackedItem> {
        self.set_status(id, TodoStatus::InProgress, now)
    }

    /// # Errors
    ///
    /// Returns `ItemNotFound` if the id does not resolve.
    pub fn reopen(&mut self, id: &str, now: DateTime<Utc>) -> Result<&TrackedItem> {
        self.set_status(id, TodoStatus::Open, now)
    }

    /// Apply a partial update. The patch is validated before anything is
    /// touched; the item becomes `manual` and keeps its id.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a malformed patch and `ItemNotFound` if the
    /// id does not resolve.
    pub fn apply_edit(&mut self, id: &str, patch: &ItemPatch, now: DateTime<Utc>) -> Result<&TrackedItem> {
        let valid = patch.validate()?;
        let id = self.resolve_id(id)?;
        if let Some(item) = self.db.todos.get_mut(&id) {
            valid.apply_to(item);
            item.source = ItemSource::Manual;
            item.touch(now);
        }
        self.db.touch(now);
        self.get_resolved(&id)
    }

    /// Fill enrichment fields that are still empty.
    ///
    /// Values already present (set by a person or an earlier enrichment) are
    /// never overwritten. Returns how many items changed.
    pub fn merge_enrichment(&mut self, enrichments: &[Enrichment], now: DateTime<Utc>) -> usize {
        let mut changed = 0;
        for enrichment in enrichments {
            let Some(item) = self.db.todos.get_mut(&enrichment.id) else {
                continue;
            };
            if enrichment.fill(item) {
                item.touch(now);
                changed += 1;
            }
        }
        if changed > 0 {
            self.db.touch(now);
        }
        changed
    }

    fn get_resolved(&self, id: &str) -> Result<&TrackedItem> {
        self.db
            .todos
            .get(id)
            .ok_or_else(|| Error::ItemNotFound { id: id.to_string() })
    }
}

/// `base`, or `base-2`, `base-3`, ... when taken.
fn free_id(taken: &BTreeMap<String, TrackedItem>, base: &str) -> String {
    if !taken.contains_key(base) {
        return base.to_string();
    }
    (2u32..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.contains_key(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
    }

    fn scan(file: &str, line: u32, text: &str) -> TrackedItem {
        TrackedItem::scanned("p1", file, line, text, t0())
    }

    fn store_with(items: Vec<TrackedItem>) -> TodoStore {
        let mut store = TodoStore::empty("p1", "Alpha", t0());
        store.upsert_from_file("src/a.rs", items, t0());
        store
    }

    #[test]
    fn test_rescan_unchanged_is_stable() {
        let mut store = store_with(vec![scan("src/a.rs", 3, "TODO: one")]);
        let before = store.database().clone();

        let stats = store.upsert_from_file("src/a.rs", vec![scan("src/a.rs", 3, "TODO: one")], t0() + Duration::hours(1));

        assert_eq!(stats.carried, 1);
        assert!(!stats.any());
        assert_eq!(store.database(), &before);
    }

    #[test]
    fn test_manual_item_survives_rescan() {
        let mut store = TodoStore::empty("p1", "Alpha", t0());
        let manual_id = store.add_manual("TODO: keep me", "src/a.rs", 7, t0()).unwrap().id.clone();
        let patch = ItemPatch {
            priority: Some("high".into()),
            ..ItemPatch::default()
        };
        store.apply_edit(&manual_id, &patch, t0()).unwrap();
        let before = store.get(&manual_id).unwrap().clone();

        // A scan that produces the same coordinates and different content.
        let mut clash = scan("src/a.rs", 7, "todo: KEEP me");
        clash.priority = Some(Priority::Low);
        let later = t0() + Duration::minutes(5);
        let stats = store.upsert_from_file("src/a.rs", vec![clash], later);

        assert_eq!(stats.kept_manual, 1);
        assert_eq!(stats.inserted, 0);
        let after = store.get(&manual_id).unwrap();
        assert_eq!(after.text, before.text);
        assert_eq!(after.priority, Some(Priority::High));
        assert_eq!(after.source, ItemSource::Manual);
        assert_eq!(after.updated_at, later);
    }

    #[test]
    fn test_vanished_scan_item_is_auto_resolved_not_deleted() {
        let item = scan("src/a.rs", 3, "TODO: gone soon");
        let id = item.id.clone();
        let mut store = store_with(vec![item]);

        let later = t0() + Duration::minutes(1);
        let stats = store.upsert_from_file("src/a.rs", Vec::new(), later);

        assert_eq!(stats.auto_resolved, 1);
        let kept = store.get(&id).unwrap();
        assert_eq!(kept.status, TodoStatus::Resolved);
        assert_eq!(kept.updated_at, later);

        // It reappears: reopened.
        let back = store.upsert_from_file("src/a.rs", vec![scan("src/a.rs", 3, "TODO: gone soon")], later);
        assert_eq!(back.carried, 1);
        assert_eq!(store.get(&id).unwrap().status, TodoStatus::Open);
    }

    #[test]
    fn test_user_resolution_survives_rescan() {
        let item = scan("src/a.rs", 3, "TODO: done by hand");
        let id = item.id.clone();
        let mut store = store_with(vec![item]);
        store.mark_resolved(&id, t0()).unwrap();

        store.upsert_from_file("src/a.rs", vec![scan("src/a.rs", 3, "TODO: done by hand")], t0());
        assert_eq!(store.get(&id).unwrap().status, TodoStatus::Resolved);
    }

    #[test]
    fn test_scan_carries_enrichment_and_created_at() {
        let item = scan("src/a.rs", 3, "TODO: enrich");
        let id = item.id.clone();
        let mut store = store_with(vec![item]);
        store.merge_enrichment(&[Enrichment::baseline(&id)], t0());

        let later = t0() + Duration::days(1);
        let rescanned = TrackedItem::scanned("p1", "src/a.rs", 3, "TODO: enrich", later);
        store.upsert_from_file("src/a.rs", vec![rescanned], later);

        let item = store.get(&id).unwrap();
        assert_eq!(item.priority, Some(Priority::Medium));
        assert_eq!(item.created_at, t0());
    }

    #[test]
    fn test_replace_all_resolves_items_of_cleaned_files() {
        let mut store = TodoStore::empty("p1", "Alpha", t0());
        store.replace_all(vec![scan("a.rs", 1, "TODO a"), scan("b.rs", 1, "TODO b")], &BTreeSet::new(), t0());
        assert_eq!(store.open_items().len(), 2);

        let stats = store.replace_all(vec![scan("a.rs", 1, "TODO a")], &BTreeSet::new(), t0());
        assert_eq!(stats.auto_resolved, 1);
        assert_eq!(store.open_items().len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_replace_all_leaves_unreadable_files_alone() {
        let mut store = TodoStore::empty("p1", "Alpha", t0());
        store.replace_all(vec![scan("big.rs", 1, "TODO: keep working")], &BTreeSet::new(), t0());
        let id = store.items().next().unwrap().id.clone();
        store.mark_in_progress(&id, t0()).unwrap();

        let skipped = BTreeSet::from(["big.rs".to_string()]);
        let stats = store.replace_all(Vec::new(), &skipped, t0() + Duration::minutes(1));

        assert_eq!(stats.auto_resolved, 0);
        assert_eq!(store.get(&id).unwrap().status, TodoStatus::InProgress);
    }

    #[test]
    fn test_mark_resolved_is_idempotent_apart_from_timestamp() {
        let item = scan("src/a.rs", 3, "TODO: x");
        let id = item.id.clone();
        let mut store = store_with(vec![item]);

        let first = store.mark_resolved(&id, t0() + Duration::seconds(1)).unwrap().clone();
        let second = store.mark_resolved(&id, t0() + Duration::seconds(2)).unwrap().clone();

        assert_eq!(first.status, second.status);
        assert!(second.updated_at > first.updated_at);
        let mut normalized = second.clone();
        normalized.updated_at = first.updated_at;
        assert_eq!(normalized, first);
    }

    #[test]
    fn test_timestamps_never_move_backwards() {
        let item = scan("src/a.rs", 3, "TODO: x");
        let id = item.id.clone();
        let mut store = store_with(vec![item]);
        store.mark_in_progress(&id, t0() + Duration::hours(2)).unwrap();

        // Clock regression.
        let item = store.reopen(&id, t0()).unwrap();
        assert_eq!(item.status, TodoStatus::Open);
        assert_eq!(item.updated_at, t0() + Duration::hours(2));
    }

    #[test]
    fn test_apply_edit_forces_manual_and_keeps_id() {
        let item = scan("src/a.rs", 3, "TODO: x");
        let id = item.id.clone();
        let mut store = store_with(vec![item]);

        let patch = ItemPatch {
            text: Some("TODO: reworded".into()),
            labels: Some(vec!["backend".into()]),
            urgency_score: Some(0.9),
            ..ItemPatch::default()
        };
        let edited = store.apply_edit(&id[..10], &patch, t0() + Duration::seconds(1)).unwrap();
        assert_eq!(edited.id, id);
        assert_eq!(edited.text, "TODO: reworded");
        assert_eq!(edited.source, ItemSource::Manual);
        assert_eq!(edited.labels, vec!["backend".to_string()]);
    }

    #[test]
    fn test_edited_text_survives_rescan_of_unchanged_file() {
        let item = scan("src/main.rs", 10, "TODO: fix bug");
        let id = item.id.clone();
        let mut store = TodoStore::empty("p1", "Alpha", t0());
        store.upsert_from_file("src/main.rs", vec![item], t0());

        let patch = ItemPatch {
            text: Some("TODO: fix bug urgently".into()),
            ..ItemPatch::default()
        };
        store.apply_edit(&id, &patch, t0() + Duration::seconds(1)).unwrap();

        let later = t0() + Duration::minutes(1);
        let stats = store.upsert_from_file(
            "src/main.rs",
            vec![TrackedItem::scanned("p1", "src/main.rs", 10, "TODO: fix bug", later)],
            later,
        );

        assert_eq!(stats.kept_manual, 1);
        assert_eq!(stats.inserted, 0);
        assert_eq!(store.len(), 1);
        let item = store.get(&id).unwrap();
        assert_eq!(item.text, "TODO: fix bug urgently");
        assert_eq!(item.source, ItemSource::Manual);
    }

    #[test]
    fn test_invalid_patch_is_rejected_before_mutation() {
        let item = scan("src/a.rs", 3, "TODO: x");
        let id = item.id.clone();
        let mut store = store_with(vec![item]);
        let before = store.database().clone();

        let patch = ItemPatch {
            text: Some("   ".into()),
            ..ItemPatch::default()
        };
        assert!(matches!(store.apply_edit(&id, &patch, t0()), Err(Error::Validation(_))));
        assert_eq!(store.database(), &before);
    }

    #[test]
    fn test_unknown_id_suggests_similar() {
        let item = scan("src/a.rs", 3, "TODO: x");
        let id = item.id.clone();
        let mut store = store_with(vec![item]);

        let mut typo: String = id.chars().take(8).collect();
        typo.replace_range(7..8, if typo.ends_with('0') { "1" } else { "0" });
        match store.mark_resolved(&typo, t0()) {
            Err(Error::ItemNotFoundSimilar { similar, .. }) => assert_eq!(similar.len(), 1),
            other => panic!("expected similar-id error, got {other:?}"),
        }
        assert!(matches!(
            store.mark_resolved("zzzzzzzz", t0()),
            Err(Error::ItemNotFound { .. })
        ));
    }

    #[test]
    fn test_merge_enrichment_never_clobbers() {
        let item = scan("src/a.rs", 3, "TODO: x");
        let id = item.id.clone();
        let mut store = store_with(vec![item]);
        let patch = ItemPatch {
            priority: Some("urgent".into()),
            ..ItemPatch::default()
        };
        store.apply_edit(&id, &patch, t0()).unwrap();

        let changed = store.merge_enrichment(&[Enrichment::baseline(&id)], t0());
        assert_eq!(changed, 1);
        let item = store.get(&id).unwrap();
        assert_eq!(item.priority, Some(Priority::Urgent));
        assert_eq!(item.urgency_score, Some(0.3));

        assert_eq!(store.merge_enrichment(&[Enrichment::baseline(&id)], t0()), 0);
    }

    #[test]
    fn test_rekey_rederives_ids() {
        let mut store = store_with(vec![scan("src/a.rs", 3, "TODO: x")]);
        store.rekey("proj_remote", "Remote", t0());

        let expected = stable_id("proj_remote", "src/a.rs", 3, "TODO: x");
        assert!(store.get(&expected).is_some());
        assert_eq!(store.project_id(), "proj_remote");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_rekey_collision_keeps_both_items() {
        let original = scan("f.rs", 3, "TODO: x");
        let edited_id = original.id.clone();
        let mut store = TodoStore::empty("p1", "Alpha", t0());
        store.upsert_from_file("f.rs", vec![original], t0());
        let patch = ItemPatch {
            text: Some("TODO: y".into()),
            ..ItemPatch::default()
        };
        store.apply_edit(&edited_id, &patch, t0() + Duration::minutes(2)).unwrap();

        // The new wording is then written into the file at the same line.
        let later = t0() + Duration::minutes(1);
        store.upsert_from_file("f.rs", vec![TrackedItem::scanned("p1", "f.rs", 3, "TODO: y", later)], later);
        assert_eq!(store.len(), 2);

        store.rekey("proj_remote", "Remote", t0() + Duration::minutes(3));

        assert_eq!(store.len(), 2);
        let derived = stable_id("proj_remote", "f.rs", 3, "TODO: y");
        let winner = store.get(&derived).unwrap();
        assert_eq!(winner.source, ItemSource::Manual);
        let other = store.items().find(|i| i.id != derived).unwrap();
        assert_eq!(other.source, ItemSource::Scan);
        assert_eq!(other.text, "TODO: y");
    }

    #[test]
    fn test_open_items_ordering() {
        let mut store = TodoStore::empty("p1", "Alpha", t0());
        store.replace_all(vec![scan("b.rs", 1, "TODO low"), scan("a.rs", 9, "TODO urgent")], &BTreeSet::new(), t0());
        let urgent_id = store.items().find(|i| i.text.contains("urgent")).unwrap().id.clone();
        let patch = ItemPatch {
            priority: Some("p0".into()),
            ..ItemPatch::default()
        };
        store.apply_edit(&urgent_id, &patch, t0()).unwrap();

        let open = store.open_items();
        assert_eq!(open[0].id, urgent_id);
    }
}
