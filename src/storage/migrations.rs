//! Schema migrations for the persisted database document.
//!
//! Migrations run on the raw JSON value before it is deserialized, so a
//! document with a missing or malformed field still loads. Every step is
//! additive: values that cannot be interpreted are moved under a
//! `legacy*` / `recovered*` key instead of being dropped.
//!
//! | version | shape                                                     |
//! |---------|-----------------------------------------------------------|
//! | 0       | bare array of todos, or an object without `meta`          |
//! | 1       | `{meta, todos}`                                           |
//! | 2       | items carry `source`; meta carries `backendSyncInfo`      |
//!
//! A version newer than [`CURRENT_SCHEMA_VERSION`] passes through with
//! defaults filled in and its version number untouched.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::identity::stable_id;
use crate::model::CURRENT_SCHEMA_VERSION;
use crate::validate::{normalize_priority, normalize_status};

const EPOCH: &str = "1970-01-01T00:00:00Z";

/// Outcome of [`migrate`].
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationResult {
    /// True when the document changed and should be written back.
    pub migrated: bool,
    pub value: Value,
}

/// A single upgrade step from `from` to `from + 1`.
struct Migration {
    from: u32,
    description: &'static str,
    apply: fn(&mut Map<String, Value>),
}

/// All migrations in order.
const MIGRATIONS: &[Migration] = &[
    Migration {
        from: 0,
        description: "wrap legacy document into meta/todos",
        apply: v0_to_v1,
    },
    Migration {
        from: 1,
        description: "add item source and backend sync info",
        apply: v1_to_v2,
    },
];

/// Upgrade and normalize a loaded document.
///
/// # Errors
///
/// Returns an error only when the root is a scalar (string, number, bool or
/// null), which has no structure to preserve. The caller treats this like
/// corrupt data.
pub fn migrate(blob: Value) -> Result<MigrationResult, String> {
    let mut migrated = false;

    let mut doc = match blob {
        Value::Object(map) => map,
        Value::Array(todos) => {
            migrated = true;
            let mut map = Map::new();
            map.insert("todos".into(), Value::Array(todos));
            map
        }
        other => {
            return Err(format!("database root must be an object, found {}", type_name(&other)));
        }
    };

    let mut version = detect_version(&mut doc);
    let detected = version;

    // Apply pending migrations in order
    while version < CURRENT_SCHEMA_VERSION {
        let Some(step) = MIGRATIONS.iter().find(|m| m.from == version) else {
            break;
        };
        info!(from = step.from, to = step.from + 1, step = step.description, "Applying migration");
        (step.apply)(&mut doc);
        version += 1;
        migrated = true;
    }

    if detected > CURRENT_SCHEMA_VERSION {
        warn!(
            version = detected,
            current = CURRENT_SCHEMA_VERSION,
            "Database written by a newer version; passing through without dropping fields"
        );
    }

    migrated |= normalize(&mut doc, version);

    Ok(MigrationResult {
        migrated,
        value: Value::Object(doc),
    })
}

/// Determine the document version. Documents without `meta` are version 0;
/// `meta` without a readable `schemaVersion` is treated as version 1.
fn detect_version(doc: &mut Map<String, Value>) -> u32 {
    let Some(Value::Object(meta)) = doc.get_mut("meta") else {
        return 0;
    };

    let raw = meta.get("schemaVersion").cloned();
    let parsed = match &raw {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    match (parsed, raw) {
        (Some(v), _) => u32::try_from(v).unwrap_or(u32::MAX),
        (None, None) => 1,
        (None, Some(unreadable)) => {
            meta.insert("legacySchemaVersion".into(), unreadable);
            1
        }
    }
}

fn v0_to_v1(doc: &mut Map<String, Value>) {
    if doc.get("meta").is_some_and(|m| !m.is_object()) {
        if let Some(old) = doc.remove("meta") {
            doc.insert("recoveredMeta".into(), old);
        }
    }
    let meta = doc
        .entry("meta")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(meta) = meta {
        meta.insert("schemaVersion".into(), Value::from(1));
    }
    doc.entry("todos").or_insert_with(|| Value::Array(Vec::new()));
}

fn v1_to_v2(doc: &mut Map<String, Value>) {
    if let Some(Value::Object(meta)) = doc.get_mut("meta") {
        meta.entry("backendSyncInfo")
            .or_insert_with(|| Value::Object(Map::new()));
        meta.insert("schemaVersion".into(), Value::from(2));
    }
    if let Some(Value::Array(items)) = doc.get_mut("todos") {
        for item in items.iter_mut().filter_map(Value::as_object_mut) {
            item.entry("source").or_insert_with(|| Value::from("scan"));
        }
    }
}

/// Fill defaults so the document deserializes. Returns true if anything changed.
fn normalize(doc: &mut Map<String, Value>, version: u32) -> bool {
    let mut changed = false;

    let mut meta = match doc.remove("meta") {
        Some(Value::Object(meta)) => meta,
        Some(old) => {
            doc.insert("recoveredMeta".into(), old);
            changed = true;
            Map::new()
        }
        None => {
            changed = true;
            Map::new()
        }
    };

    let mut recovered_items = Vec::new();
    let todos = coerce_todos(doc, &mut recovered_items, &mut changed);

    if meta.get("schemaVersion").and_then(Value::as_u64) != Some(u64::from(version)) {
        meta.insert("schemaVersion".into(), Value::from(version));
        changed = true;
    }
    for key in ["projectId", "projectName"] {
        if !meta.get(key).is_some_and(Value::is_string) {
            demote(&mut meta, key, "legacy");
            meta.insert(key.into(), Value::from(""));
            changed = true;
        }
    }
    if !is_timestamp(meta.get("updatedAt")) {
        demote(&mut meta, "updatedAt", "legacy");
        meta.insert("updatedAt".into(), Value::from(EPOCH));
        changed = true;
    }
    if !meta.get("backendSyncInfo").is_some_and(Value::is_object) {
        demote(&mut meta, "backendSyncInfo", "legacy");
        meta.insert("backendSyncInfo".into(), Value::Object(Map::new()));
        changed = true;
    }
    if let Some(Value::Object(info)) = meta.get_mut("backendSyncInfo") {
        if info.get("lastSyncedAt").is_some_and(|v| !v.is_null()) && !is_timestamp(info.get("lastSyncedAt")) {
            demote(info, "lastSyncedAt", "legacy");
            changed = true;
        }
        if info.get("lastPushedHash").is_some_and(|v| !v.is_string()) {
            demote(info, "lastPushedHash", "legacy");
            changed = true;
        }
    }

    let fallback_ts = meta
        .get("updatedAt")
        .and_then(Value::as_str)
        .unwrap_or(EPOCH)
        .to_string();
    let project_id = meta
        .get("projectId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut items: Vec<Map<String, Value>> = Vec::with_capacity(todos.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    for mut item in todos {
        changed |= normalize_item(&mut item, &project_id, &fallback_ts);
        let id = item.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        match positions.get(&id) {
            Some(&at) => {
                // Same id twice: the newer copy stays, the other is recovered.
                changed = true;
                if updated_at(&item) >= updated_at(&items[at]) {
                    let older = std::mem::replace(&mut items[at], item);
                    recovered_items.push(Value::Object(older));
                } else {
                    recovered_items.push(Value::Object(item));
                }
            }
            None => {
                positions.insert(id, items.len());
                items.push(item);
            }
        }
    }

    if !recovered_items.is_empty() {
        warn!(count = recovered_items.len(), "Moved unusable or duplicate items under meta.recoveredItems");
        if !meta.get("recoveredItems").is_none_or(Value::is_array) {
            demote(&mut meta, "recoveredItems", "legacy");
        }
        if let Value::Array(slot) = meta
            .entry("recoveredItems")
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            slot.extend(recovered_items);
        }
    }

    let items: Vec<Value> = items.into_iter().map(Value::Object).collect();
    doc.insert("meta".into(), Value::Object(meta));
    doc.insert("todos".into(), Value::Array(items));

    changed
}

/// Coerce the item collection to a list of objects.
fn coerce_todos(
    doc: &mut Map<String, Value>,
    recovered: &mut Vec<Value>,
    changed: &mut bool,
) -> Vec<Map<String, Value>> {
    let raw = doc.remove("todos").unwrap_or(Value::Null);
    let entries: Vec<(Option<String>, Value)> = match raw {
        Value::Array(list) => list.into_iter().map(|v| (None, v)).collect(),
        Value::Object(map) => {
            *changed = true;
            map.into_iter().map(|(k, v)| (Some(k), v)).collect()
        }
        Value::Null => {
            *changed = true;
            Vec::new()
        }
        other => {
            *changed = true;
            recovered.push(other);
            Vec::new()
        }
    };

    let mut items = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        match value {
            Value::Object(mut item) => {
                if let Some(key) = key {
                    if !item.get("id").is_some_and(Value::is_string) {
                        demote(&mut item, "id", "legacy");
                        item.insert("id".into(), Value::from(key));
                    }
                }
                items.push(item);
            }
            other => {
                *changed = true;
                recovered.push(other);
            }
        }
    }
    items
}

fn normalize_item(item: &mut Map<String, Value>, project_id: &str, fallback_ts: &str) -> bool {
    let mut changed = false;

    for key in ["text", "filePath"] {
        if !item.get(key).is_some_and(Value::is_string) {
            demote(item, key, "legacy");
            item.insert(key.into(), Value::from(""));
            changed = true;
        }
    }

    let line = item.get("line").and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    });
    match line.and_then(|l| u32::try_from(l).ok()) {
        Some(_) if item.get("line").is_some_and(Value::is_u64) => {}
        Some(l) => {
            item.insert("line".into(), Value::from(l));
            changed = true;
        }
        None => {
            demote(item, "line", "legacy");
            item.insert("line".into(), Value::from(0));
            changed = true;
        }
    }

    if !item.get("id").is_some_and(|v| v.as_str().is_some_and(|s| !s.is_empty())) {
        demote(item, "id", "legacy");
        let id = stable_id(
            project_id,
            item.get("filePath").and_then(Value::as_str).unwrap_or_default(),
            item.get("line")
                .and_then(Value::as_u64)
                .and_then(|l| u32::try_from(l).ok())
                .unwrap_or_default(),
            item.get("text").and_then(Value::as_str).unwrap_or_default(),
        );
        item.insert("id".into(), Value::from(id));
        changed = true;
    }

    changed |= normalize_enum(item, "status", "open", normalize_status);
    changed |= normalize_enum(item, "source", "scan", |s| match s {
        "scan" | "manual" => Ok(s.to_string()),
        other => Err((other.to_string(), None)),
    });
    if item.contains_key("priority") && !item.get("priority").is_some_and(Value::is_null) {
        if let Some(Value::String(raw)) = item.get("priority") {
            match normalize_priority(raw) {
                Ok(canonical) if &canonical == raw => {}
                Ok(canonical) => {
                    demote(item, "priority", "legacy");
                    item.insert("priority".into(), Value::from(canonical));
                    changed = true;
                }
                Err(_) => {
                    demote(item, "priority", "legacy");
                    changed = true;
                }
            }
        } else {
            demote(item, "priority", "legacy");
            changed = true;
        }
    }

    let labels_ok = item.get("labels").is_none_or(|v| {
        v.is_null() || v.as_array().is_some_and(|a| a.iter().all(Value::is_string))
    });
    if !labels_ok {
        demote(item, "labels", "legacy");
        changed = true;
    }
    if item.get("labels").is_some_and(Value::is_null) {
        item.remove("labels");
        changed = true;
    }

    let files_ok = item.get("suggestedFiles").is_none_or(|v| {
        v.is_null()
            || v.as_array().is_some_and(|a| {
                a.iter().all(|f| {
                    f.get("path").is_some_and(Value::is_string)
                        && f.get("score").is_some_and(Value::is_number)
                })
            })
    });
    if !files_ok {
        demote(item, "suggestedFiles", "legacy");
        changed = true;
    }
    if item.get("suggestedFiles").is_some_and(Value::is_null) {
        item.remove("suggestedFiles");
        changed = true;
    }

    if item
        .get("urgencyScore")
        .is_some_and(|v| !v.is_null() && !v.is_number())
    {
        demote(item, "urgencyScore", "legacy");
        changed = true;
    }
    for key in ["deadlineISO", "deadline"] {
        if item.get(key).is_some_and(|v| !v.is_null() && !v.is_string()) {
            demote(item, key, "legacy");
            changed = true;
        }
    }
    // `deadline` is the older spelling of `deadlineISO`; both at once would
    // not deserialize.
    if item.contains_key("deadlineISO") && item.contains_key("deadline") {
        if item.get("deadlineISO").is_some_and(Value::is_null) {
            if let Some(old) = item.remove("deadline") {
                item.insert("deadlineISO".into(), old);
            }
        } else if item.get("deadline").is_some_and(Value::is_null) {
            item.remove("deadline");
        } else {
            demote(item, "deadline", "legacy");
        }
        changed = true;
    }

    if !is_timestamp(item.get("updatedAt")) {
        demote(item, "updatedAt", "legacy");
        item.insert("updatedAt".into(), Value::from(fallback_ts));
        changed = true;
    }
    if !is_timestamp(item.get("createdAt")) {
        demote(item, "createdAt", "legacy");
        let created = item.get("updatedAt").cloned().unwrap_or_else(|| Value::from(fallback_ts));
        item.insert("createdAt".into(), created);
        changed = true;
    }

    changed
}

/// Ensure an enum-like string field holds a canonical value.
fn normalize_enum(
    item: &mut Map<String, Value>,
    key: &str,
    default: &str,
    canonicalize: impl Fn(&str) -> Result<String, (String, Option<String>)>,
) -> bool {
    match item.get(key) {
        Some(Value::String(raw)) => match canonicalize(raw) {
            Ok(canonical) if &canonical == raw => false,
            Ok(canonical) => {
                demote(item, key, "legacy");
                item.insert(key.into(), Value::from(canonical));
                true
            }
            Err(_) => {
                demote(item, key, "legacy");
                item.insert(key.into(), Value::from(default));
                true
            }
        },
        None => {
            item.insert(key.into(), Value::from(default));
            true
        }
        Some(_) => {
            demote(item, key, "legacy");
            item.insert(key.into(), Value::from(default));
            true
        }
    }
}

/// Move `map[key]` to `map[{prefix}{Key}]` so it is preserved but no longer
/// read as the typed field. An earlier value in that slot is kept; the new
/// one goes to `{prefix}{Key}2`, `{prefix}{Key}3`, ... No-op when the key is
/// absent.
fn demote(map: &mut Map<String, Value>, key: &str, prefix: &str) {
    let Some(old) = map.remove(key) else {
        return;
    };
    let mut chars = key.chars();
    let capitalized = chars
        .next()
        .map(|c| c.to_uppercase().collect::<String>() + chars.as_str())
        .unwrap_or_default();
    let base = format!("{prefix}{capitalized}");
    let mut slot = base.clone();
    let mut n = 2;
    while map.contains_key(&slot) {
        slot = format!("{base}{n}");
        n += 1;
    }
    map.insert(slot, old);
}

/// An item's `updatedAt`, already normalized to a valid timestamp.
fn updated_at(item: &Map<String, Value>) -> Option<DateTime<FixedOffset>> {
    item.get("updatedAt")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

fn is_timestamp(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
