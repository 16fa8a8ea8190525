//! Tracked TODO item model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identity::{normalize_path, stable_id};
use crate::validate::{normalize_priority, normalize_status};

/// Lifecycle status of a tracked item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    /// Not started.
    #[default]
    Open,
    /// Someone is working on it.
    InProgress,
    /// Done. Resolved items are retained for history.
    Resolved,
}

impl TodoStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TodoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_status(s) {
            Ok(canonical) => match canonical.as_str() {
                "open" => Ok(Self::Open),
                "in_progress" => Ok(Self::InProgress),
                _ => Ok(Self::Resolved),
            },
            Err((input, Some(suggestion))) => {
                Err(format!("unknown status '{input}' (did you mean '{suggestion}'?)"))
            }
            Err((input, None)) => Err(format!("unknown status '{input}'")),
        }
    }
}

/// Where an item's current content came from.
///
/// `Scan` items are re-derived from their origin file on every scan.
/// `Manual` items were created or edited by a person and outrank re-scans.
/// The transition is one-way: `Scan → Manual`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSource {
    #[default]
    Scan,
    Manual,
}

impl ItemSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::Manual => "manual",
        }
    }
}

/// Item priority as produced by enrichment or set by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    /// Rank for ordering reminders; unprioritized items rank 0.
    #[must_use]
    pub const fn rank(priority: Option<Self>) -> u8 {
        match priority {
            None => 0,
            Some(Self::Low) => 1,
            Some(Self::Medium) => 2,
            Some(Self::High) => 3,
            Some(Self::Urgent) => 4,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_priority(s) {
            Ok(canonical) => match canonical.as_str() {
                "low" => Ok(Self::Low),
                "medium" => Ok(Self::Medium),
                "high" => Ok(Self::High),
                _ => Ok(Self::Urgent),
            },
            Err((input, Some(suggestion))) => {
                Err(format!("unknown priority '{input}' (did you mean '{suggestion}'?)"))
            }
            Err((input, None)) => Err(format!("unknown priority '{input}'")),
        }
    }
}

/// A file suggested as related to an item, with a relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedFile {
    pub path: String,
    pub score: f64,
}

/// A TODO tracked for a project.
///
/// Unknown fields are kept in `extra` so documents written by a newer
/// version survive a load/save round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedItem {
    /// Stable id, see [`crate::identity::stable_id`].
    pub id: String,
    pub text: String,
    /// Workspace-relative path with forward slashes.
    pub file_path: String,
    /// 1-based line number.
    pub line: u32,
    #[serde(default)]
    pub status: TodoStatus,
    #[serde(default)]
    pub source: ItemSource,

    // Enrichment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(
        default,
        rename = "deadlineISO",
        alias = "deadline",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_files: Vec<SuggestedFile>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TrackedItem {
    /// Build a scan-sourced item with its stable id.
    #[must_use]
    pub fn scanned(
        project_id: &str,
        file_path: &str,
        line: u32,
        text: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self::build(project_id, file_path, line, text, ItemSource::Scan, now)
    }

    /// Build a manually created item with its stable id.
    #[must_use]
    pub fn manual(
        project_id: &str,
        file_path: &str,
        line: u32,
        text: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self::build(project_id, file_path, line, text, ItemSource::Manual, now)
    }

    fn build(
        project_id: &str,
        file_path: &str,
        line: u32,
        text: &str,
        source: ItemSource,
        now: DateTime<Utc>,
    ) -> Self {
        let file_path = normalize_path(file_path);
        let text = text.trim().to_string();
        Self {
            id: stable_id(project_id, &file_path, line, &text),
            text,
            file_path,
            line,
            status: TodoStatus::Open,
            source,
            priority: None,
            labels: Vec::new(),
            deadline: None,
            urgency_score: None,
            suggested_files: Vec::new(),
            created_at: now,
            updated_at: now,
            extra: Map::new(),
        }
    }

    /// Advance `updated_at` to `now`, never moving it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.source == ItemSource::Manual
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.status == TodoStatus::Resolved
    }

    /// Short id prefix for display.
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.id
            .char_indices()
            .nth(8)
            .map_or(self.id.as_str(), |(idx, _)| &self.id[..idx])
    }
}
