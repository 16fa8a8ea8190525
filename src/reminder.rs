//! Reminders for the file being worked on.
//!
//! At most one reminder is surfaced at a time: the highest-priority
//! unresolved item of the active file that is not in its cooldown window.
//! The scheduler owns the per-item timestamps; the CLI keeps them in
//! `.busybee/reminders.json` between invocations.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::identity::normalize_path;
use crate::model::{Priority, TrackedItem};
use crate::storage::atomic_write;

/// Minimum minutes between two reminders for the same item.
pub const REMINDER_COOLDOWN_MINUTES: i64 = 10;

/// How many minutes a snooze pushes an item's next reminder.
pub const DEFAULT_SNOOZE_MINUTES: i64 = 30;

/// File name of the persisted scheduler state.
pub const REMINDERS_FILE: &str = "reminders.json";

/// Per-item reminder bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderScheduler {
    /// Item id → when it was last shown. A snooze stores a future instant.
    #[serde(default)]
    last_shown: BTreeMap<String, DateTime<Utc>>,
    #[serde(skip, default = "default_cooldown")]
    cooldown: Duration,
}

fn default_cooldown() -> Duration {
    Duration::minutes(REMINDER_COOLDOWN_MINUTES)
}

impl Default for ReminderScheduler {
    fn default() -> Self {
        Self::new(default_cooldown())
    }
}

impl ReminderScheduler {
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_shown: BTreeMap::new(),
            cooldown,
        }
    }

    /// Load scheduler state from `dir`. Missing or unreadable state starts fresh.
    #[must_use]
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(REMINDERS_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable reminder state");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Persist scheduler state into `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be serialized or written.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        atomic_write(&dir.join(REMINDERS_FILE), &json)?;
        Ok(())
    }

    /// Whether `item` may be shown at `now`.
    #[must_use]
    pub fn is_due(&self, item: &TrackedItem, now: DateTime<Utc>) -> bool {
        if item.is_resolved() {
            return false;
        }
        self.last_shown
            .get(&item.id)
            .is_none_or(|last| now - *last > self.cooldown)
    }

    /// Pick the reminder for `file`, recording it as shown.
    ///
    /// Candidates are the unresolved items of `file`, highest priority first.
    pub fn next_for_file<'a, I>(
        &mut self,
        items: I,
        file: &str,
        now: DateTime<Utc>,
    ) -> Option<&'a TrackedItem>
    where
        I: IntoIterator<Item = &'a TrackedItem>,
    {
        let file = normalize_path(file);
        let mut candidates: Vec<&TrackedItem> = items
            .into_iter()
            .filter(|i| i.file_path == file && !i.is_resolved())
            .collect();
        candidates.sort_by(|a, b| {
            Priority::rank(b.priority)
                .cmp(&Priority::rank(a.priority))
                .then(a.line.cmp(&b.line))
        });

        let chosen = candidates.into_iter().find(|i| self.is_due(i, now))?;
        self.last_shown.insert(chosen.id.clone(), now);
        debug!(id = %chosen.id, file = %file, "Reminder due");
        Some(chosen)
    }

    /// Postpone the next reminder for `id` by `duration` past the cooldown.
    pub fn snooze(&mut self, id: &str, now: DateTime<Utc>, duration: Duration) {
        self.last_shown.insert(id.to_string(), now + duration);
    }

    /// Drop state for ids no longer tracked.
    pub fn retain_ids<'a>(&mut self, live: impl IntoIterator<Item = &'a str>) {
        let live: std::collections::BTreeSet<&str> = live.into_iter().collect();
        self.last_shown.retain(|id, _| live.contains(id.as_str()));
    }
}

/// One-line reminder text: `[PRIORITY] text (file:line)`.
#[must_use]
pub fn format_reminder(item: &TrackedItem) -> String {
    let tag = item
        .priority
        .map_or_else(|| "TODO".to_string(), |p| p.as_str().to_uppercase());
    format!("[{tag}] {} ({}:{})", item.text, item.file_path, item.line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn cooldown() -> Duration {
        Duration::minutes(REMINDER_COOLDOWN_MINUTES)
    }

    fn snooze() -> Duration {
        Duration::minutes(DEFAULT_SNOOZE_MINUTES)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    fn item(file: &str, line: u32, text: &str, priority: Option<Priority>) -> TrackedItem {
        let mut item = TrackedItem::scanned("p", file, line, text, t0());
        item.priority = priority;
        item
    }

    #[test]
    fn test_highest_priority_first() {
        let items = vec![
            item("a.rs", 1, "low", Some(Priority::Low)),
            item("a.rs", 2, "urgent", Some(Priority::Urgent)),
            item("b.rs", 3, "other file", Some(Priority::Urgent)),
        ];
        let mut scheduler = ReminderScheduler::default();
        let chosen = scheduler.next_for_file(&items, "a.rs", t0()).unwrap();
        assert_eq!(chosen.text, "urgent");
    }

    #[test]
    fn test_cooldown_rotates_candidates() {
        let items = vec![
            item("a.rs", 1, "first", Some(Priority::High)),
            item("a.rs", 2, "second", None),
        ];
        let mut scheduler = ReminderScheduler::default();
        assert_eq!(scheduler.next_for_file(&items, "a.rs", t0()).unwrap().text, "first");
        assert_eq!(scheduler.next_for_file(&items, "a.rs", t0()).unwrap().text, "second");
        assert!(scheduler.next_for_file(&items, "a.rs", t0()).is_none());

        let later = t0() + cooldown() + Duration::seconds(1);
        assert_eq!(scheduler.next_for_file(&items, "a.rs", later).unwrap().text, "first");
    }

    #[test]
    fn test_resolved_items_are_never_due() {
        let mut done = item("a.rs", 1, "done", Some(Priority::Urgent));
        done.status = crate::model::TodoStatus::Resolved;
        let mut scheduler = ReminderScheduler::default();
        assert!(scheduler.next_for_file(&[done], "a.rs", t0()).is_none());
    }

    #[test]
    fn test_snooze() {
        let items = vec![item("a.rs", 1, "x", None)];
        let mut scheduler = ReminderScheduler::default();
        scheduler.snooze(&items[0].id, t0(), snooze());

        let after_cooldown = t0() + cooldown() + Duration::minutes(1);
        assert!(!scheduler.is_due(&items[0], after_cooldown));
        let after_snooze = t0() + snooze() + cooldown() + Duration::minutes(1);
        assert!(scheduler.is_due(&items[0], after_snooze));
    }

    #[test]
    fn test_state_round_trip() {
        let dir = TempDir::new().unwrap();
        let items = vec![item("a.rs", 1, "x", None)];
        let mut scheduler = ReminderScheduler::default();
        scheduler.next_for_file(&items, "a.rs", t0());
        scheduler.save(dir.path()).unwrap();

        let loaded = ReminderScheduler::load(dir.path());
        assert_eq!(loaded, scheduler);
        assert!(!loaded.is_due(&items[0], t0()));
    }

    #[test]
    fn test_format_reminder() {
        let with = item("src/a.rs", 7, "fix it", Some(Priority::High));
        let without = item("src/a.rs", 8, "later", None);
        assert_eq!(format_reminder(&with), "[HIGH] fix it (src/a.rs:7)");
        assert_eq!(format_reminder(&without), "[TODO] later (src/a.rs:8)");
    }
}
