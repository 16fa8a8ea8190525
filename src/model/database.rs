//! Per-project database document.
//!
//! On disk the document is `{"meta": {...}, "todos": [...]}`. In memory the
//! items are keyed by id so uniqueness holds by construction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::item::TrackedItem;

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Bookkeeping about the last exchange with the remote canonical store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendSyncInfo {
    /// Last successful pull/merge/push cycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Content hash of the last payload the remote accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pushed_hash: Option<String>,
}

/// Document metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbMeta {
    pub schema_version: u32,
    pub project_id: String,
    pub project_name: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub backend_sync_info: BackendSyncInfo,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// All tracked items of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDatabase {
    pub meta: DbMeta,
    #[serde(with = "todo_list", default)]
    pub todos: BTreeMap<String, TrackedItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectDatabase {
    /// Create an empty database at the current schema version.
    #[must_use]
    pub fn new(project_id: &str, project_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            meta: DbMeta {
                schema_version: CURRENT_SCHEMA_VERSION,
                project_id: project_id.to_string(),
                project_name: project_name.to_string(),
                updated_at: now,
                backend_sync_info: BackendSyncInfo::default(),
                extra: Map::new(),
            },
            todos: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.meta.project_id
    }

    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.meta.project_name
    }

    /// Iterate items in id order.
    pub fn items(&self) -> impl Iterator<Item = &TrackedItem> {
        self.todos.values()
    }

    /// Items as an owned list in id order.
    #[must_use]
    pub fn item_list(&self) -> Vec<TrackedItem> {
        self.todos.values().cloned().collect()
    }

    /// Replace the item set.
    pub fn set_items(&mut self, items: impl IntoIterator<Item = TrackedItem>) {
        self.todos = items.into_iter().map(|item| (item.id.clone(), item)).collect();
    }

    /// Advance the document timestamp, never backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.meta.updated_at {
            self.meta.updated_at = now;
        }
    }
}

/// Serialize the id map as a list; on load, duplicate ids keep the newer copy.
mod todo_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    use crate::model::item::TrackedItem;

    pub fn serialize<S>(items: &BTreeMap<String, TrackedItem>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(items.values())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, TrackedItem>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let list = Vec::<TrackedItem>::deserialize(deserializer)?;
        let mut map: BTreeMap<String, TrackedItem> = BTreeMap::new();
        for item in list {
            match map.get(&item.id) {
                Some(existing) if existing.updated_at > item.updated_at => {}
                _ => {
                    map.insert(item.id.clone(), item);
                }
            }
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_new_database() {
        let db = ProjectDatabase::new("p1", "Alpha", at(10));
        assert_eq!(db.meta.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(db.project_id(), "p1");
        assert!(db.todos.is_empty());
    }

    #[test]
    fn test_round_trip_as_list() {
        let mut db = ProjectDatabase::new("p1", "Alpha", at(10));
        db.set_items([
            TrackedItem::scanned("p1", "a.rs", 1, "one", at(10)),
            TrackedItem::scanned("p1", "b.rs", 2, "two", at(10)),
        ]);

        let json = serde_json::to_value(&db).unwrap();
        assert!(json["todos"].is_array());
        assert_eq!(json["todos"].as_array().unwrap().len(), 2);
        assert_eq!(json["meta"]["schemaVersion"], CURRENT_SCHEMA_VERSION);

        let back: ProjectDatabase = serde_json::from_value(json).unwrap();
        assert_eq!(back, db);
    }

    #[test]
    fn test_duplicate_ids_keep_newer() {
        let old = TrackedItem::scanned("p1", "a.rs", 1, "one", at(10));
        let mut newer = old.clone();
        newer.text = "one (edited)".into();
        newer.updated_at = at(20);

        let json = serde_json::json!({
            "meta": {
                "schemaVersion": 2,
                "projectId": "p1",
                "projectName": "Alpha",
                "updatedAt": "2025-01-01T00:00:00Z"
            },
            "todos": [newer, old]
        });
        let db: ProjectDatabase = serde_json::from_value(json).unwrap();
        assert_eq!(db.todos.len(), 1);
        assert_eq!(db.items().next().unwrap().text, "one (edited)");
    }
}
