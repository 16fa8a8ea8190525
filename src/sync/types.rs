//! Wire types for the remote canonical store, and sync outcomes.
//!
//! Remote payloads are deserialized into loose DTOs first and validated
//! item by item before anything reaches the merge engine. A single bad item
//! is rejected on its own; it does not poison the rest of the snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::merge::MergeStats;
use crate::model::{ItemSource, Priority, ProjectRef, SuggestedFile, TodoStatus, TrackedItem};
use crate::storage::StorageMode;
use crate::validate::validate_urgency;

/// Failure talking to the remote store or enrichment service.
///
/// Callers branch on the variant: `NotFound` is a normal outcome for a
/// project that has never been pushed, `Offline` is retried on the next
/// sync, the rest are reported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The requested resource does not exist remotely.
    #[error("not found on remote: {0}")]
    NotFound(String),

    /// Connection refused, DNS failure, timeout.
    #[error("remote unreachable: {0}")]
    Offline(String),

    /// The response could not be parsed into the expected shape.
    #[error("malformed response from remote: {0}")]
    MalformedResponse(String),

    /// The remote answered with a non-success status.
    #[error("remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl RemoteError {
    /// True for transient failures worth retrying later.
    #[must_use]
    pub const fn is_offline(&self) -> bool {
        matches!(self, Self::Offline(_))
    }
}

// ── Responses ────────────────────────────────────────────────

/// `GET /projects`
#[derive(Debug, Deserialize)]
pub struct ProjectsResponse {
    #[serde(default)]
    pub projects: Vec<ProjectRef>,
}

/// `GET /projects/{id}/todos`
///
/// Items stay as raw values so each one can be validated on its own.
#[derive(Debug, Deserialize)]
pub struct TodosResponse {
    #[serde(default)]
    pub todos: Vec<Value>,
}

/// `POST /sync`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest<'a> {
    pub project_id: &'a str,
    pub project_name: &'a str,
    pub todos: &'a [TrackedItem],
}

/// A remote item before validation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItemDto {
    pub id: Option<String>,
    pub text: Option<String>,
    pub file_path: Option<String>,
    pub line: Option<Value>,
    pub status: Option<String>,
    pub source: Option<String>,
    pub priority: Option<String>,
    pub labels: Option<Vec<String>>,
    #[serde(rename = "deadlineISO", alias = "deadline")]
    pub deadline_iso: Option<String>,
    pub urgency_score: Option<f64>,
    pub suggested_files: Option<Vec<SuggestedFile>>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RemoteItemDto {
    /// Check the DTO and convert it into a tracked item.
    ///
    /// Required: non-empty `id`, `text`, `filePath`, a line number and a
    /// parseable `updatedAt` (LWW cannot order an item without one).
    ///
    /// # Errors
    ///
    /// Returns a message naming the offending field.
    pub fn into_item(self) -> Result<TrackedItem, String> {
        let id = self
            .id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| "missing id".to_string())?;
        let text = self.text.ok_or_else(|| format!("{id}: missing text"))?;
        let file_path = self.file_path.ok_or_else(|| format!("{id}: missing filePath"))?;

        let line = match &self.line {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .and_then(|l| u32::try_from(l).ok())
        .ok_or_else(|| format!("{id}: line must be a non-negative integer"))?;

        let updated_at = parse_ts(self.updated_at.as_deref())
            .ok_or_else(|| format!("{id}: updatedAt missing or not RFC 3339"))?;
        let created_at = parse_ts(self.created_at.as_deref()).unwrap_or(updated_at);

        let status = match self.status.as_deref() {
            None => TodoStatus::Open,
            Some(s) => s.parse().map_err(|e| format!("{id}: {e}"))?,
        };
        let source = match self.source.as_deref() {
            None | Some("scan") => ItemSource::Scan,
            Some("manual") => ItemSource::Manual,
            Some(other) => return Err(format!("{id}: unknown source '{other}'")),
        };
        let priority = self
            .priority
            .as_deref()
            .map(str::parse::<Priority>)
            .transpose()
            .map_err(|e| format!("{id}: {e}"))?;
        let urgency_score = self
            .urgency_score
            .map(validate_urgency)
            .transpose()
            .map_err(|e| format!("{id}: {e}"))?;

        Ok(TrackedItem {
            id,
            text,
            file_path,
            line,
            status,
            source,
            priority,
            labels: self.labels.unwrap_or_default(),
            deadline: self.deadline_iso,
            urgency_score,
            suggested_files: self.suggested_files.unwrap_or_default(),
            created_at,
            updated_at,
            extra: self.extra,
        })
    }
}

fn parse_ts(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Validate a raw remote snapshot.
///
/// Returns the admitted items and one message per rejected item.
#[must_use]
pub fn validate_remote_items(raw: Vec<Value>) -> (Vec<TrackedItem>, Vec<String>) {
    let mut items = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();
    for value in raw {
        let checked = serde_json::from_value::<RemoteItemDto>(value)
            .map_err(|e| e.to_string())
            .and_then(RemoteItemDto::into_item);
        match checked {
            Ok(item) => items.push(item),
            Err(message) => rejected.push(message),
        }
    }
    (items, rejected)
}

// ── Outcomes ─────────────────────────────────────────────────

/// What an explicit sync achieved.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Pull, merge, persist and push all completed.
    Synced(SyncReport),
    /// The remote could not be reached; local state is untouched.
    Offline { reason: String },
    /// Another sync was already running.
    Skipped,
}

/// Details of a completed sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub project_id: String,
    pub project_name: String,
    pub merge: MergeStats,
    /// Remote items dropped by validation.
    pub rejected: Vec<String>,
    /// False when the merged state matched the last pushed payload.
    pub pushed: bool,
    pub storage: StorageMode,
}

/// What a best-effort push after a local mutation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "push", rename_all = "snake_case")]
pub enum PushOutcome {
    Pushed,
    /// Content matched the last accepted payload.
    Unchanged,
    /// No binding yet; nothing to push to.
    NotBound,
    /// Disabled by `--offline`.
    Disabled,
    Failed { reason: String },
}
