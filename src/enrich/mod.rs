//! Optional enrichment of tracked items.
//!
//! An enricher decorates items with priority, labels, a deadline, an urgency
//! score and related files. Enrichment never blocks persistence: when the
//! service is disabled or unreachable every item gets [`Enrichment::baseline`].

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{Priority, SuggestedFile, TodoStatus, TrackedItem};
use crate::sync::remote::{endpoint, http_client, send_json};
use crate::sync::RemoteError;
use crate::validate::{validate_deadline, validate_urgency};

/// Number of related files requested per item.
pub const TOP_K: usize = 5;

/// Urgency assigned when nothing better is known.
pub const BASELINE_URGENCY: f64 = 0.3;

/// Enrichment values for one item. Empty fields carry no information.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub id: String,
    pub priority: Option<Priority>,
    pub labels: Vec<String>,
    pub deadline: Option<String>,
    pub urgency_score: Option<f64>,
    pub suggested_files: Vec<SuggestedFile>,
}

impl Enrichment {
    /// Default decoration: medium priority, urgency 0.3, nothing else.
    #[must_use]
    pub fn baseline(id: &str) -> Self {
        Self {
            id: id.to_string(),
            priority: Some(Priority::Medium),
            labels: Vec::new(),
            deadline: None,
            urgency_score: Some(BASELINE_URGENCY),
            suggested_files: Vec::new(),
        }
    }

    /// Copy values into the fields of `item` that are still empty.
    ///
    /// Returns whether anything changed.
    pub fn fill(&self, item: &mut TrackedItem) -> bool {
        let mut changed = false;
        if item.priority.is_none() && self.priority.is_some() {
            item.priority = self.priority;
            changed = true;
        }
        if item.labels.is_empty() && !self.labels.is_empty() {
            item.labels.clone_from(&self.labels);
            changed = true;
        }
        if item.deadline.is_none() && self.deadline.is_some() {
            item.deadline.clone_from(&self.deadline);
            changed = true;
        }
        if item.urgency_score.is_none() && self.urgency_score.is_some() {
            item.urgency_score = self.urgency_score;
            changed = true;
        }
        if item.suggested_files.is_empty() && !self.suggested_files.is_empty() {
            item.suggested_files.clone_from(&self.suggested_files);
            changed = true;
        }
        changed
    }
}

/// A service that can enrich items.
pub trait Enricher: Send + Sync {
    /// Enrich `items` of `project_id`. Items missing from the answer get nothing.
    fn enrich(
        &self,
        project_id: &str,
        items: &[TrackedItem],
    ) -> impl Future<Output = Result<Vec<Enrichment>, RemoteError>> + Send;
}

/// Enrich with `enricher`, degrading to baseline values on failure.
///
/// Items the service did not answer for also get the baseline.
pub async fn enrich_or_baseline<E: Enricher>(
    enricher: &E,
    project_id: &str,
    items: &[TrackedItem],
) -> Vec<Enrichment> {
    if items.is_empty() {
        return Vec::new();
    }
    let mut answered = match enricher.enrich(project_id, items).await {
        Ok(list) => list,
        Err(e) => {
            warn!(project = %project_id, error = %e, "Enrichment failed; using baseline");
            Vec::new()
        }
    };
    for item in items {
        if !answered.iter().any(|e| e.id == item.id) {
            answered.push(Enrichment::baseline(&item.id));
        }
    }
    answered
}

// ── HTTP ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnrichRequest<'a> {
    project_id: &'a str,
    top_k: usize,
    todos: Vec<EnrichTodo<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnrichTodo<'a> {
    id: &'a str,
    text: &'a str,
    file_path: &'a str,
    status: TodoStatus,
}

#[derive(Debug, Deserialize)]
struct EnrichResponse {
    #[serde(default)]
    todos: Vec<EnrichedDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrichedDto {
    id: String,
    priority: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(rename = "deadlineISO", alias = "deadline")]
    deadline_iso: Option<String>,
    urgency_score: Option<f64>,
    #[serde(default)]
    suggested_files: Vec<SuggestedFile>,
}

impl EnrichedDto {
    /// Keep the values that validate; drop the rest.
    fn into_enrichment(self) -> Enrichment {
        let priority = self.priority.as_deref().and_then(|p| p.parse().ok());
        let deadline = self.deadline_iso.and_then(|d| validate_deadline(&d).ok());
        let urgency_score = self.urgency_score.and_then(|u| validate_urgency(u).ok());
        let labels = self
            .labels
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        Enrichment {
            id: self.id,
            priority,
            labels,
            deadline,
            urgency_score,
            suggested_files: self.suggested_files,
        }
    }
}

/// HTTP enricher posting to `{base}/api/todo-tracker/enrich`.
#[derive(Debug, Clone)]
pub struct HttpEnricher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEnricher {
    #[must_use]
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Enricher for HttpEnricher {
    async fn enrich(
        &self,
        project_id: &str,
        items: &[TrackedItem],
    ) -> Result<Vec<Enrichment>, RemoteError> {
        let url = endpoint(&self.base_url, &["enrich"])?;
        let request = EnrichRequest {
            project_id,
            top_k: TOP_K,
            todos: items
                .iter()
                .map(|item| EnrichTodo {
                    id: &item.id,
                    text: &item.text,
                    file_path: &item.file_path,
                    status: item.status,
                })
                .collect(),
        };
        debug!(%url, count = items.len(), "Requesting enrichment");
        let body: EnrichResponse = send_json(self.client.post(url).json(&request), "enrich").await?;
        Ok(body.todos.into_iter().map(EnrichedDto::into_enrichment).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn item(text: &str) -> TrackedItem {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        TrackedItem::scanned("p", "src/a.rs", 1, text, now)
    }

    struct Failing;

    impl Enricher for Failing {
        async fn enrich(&self, _: &str, _: &[TrackedItem]) -> Result<Vec<Enrichment>, RemoteError> {
            Err(RemoteError::Offline("down".into()))
        }
    }

    struct Partial;

    impl Enricher for Partial {
        async fn enrich(&self, _: &str, items: &[TrackedItem]) -> Result<Vec<Enrichment>, RemoteError> {
            let mut first = Enrichment::baseline(&items[0].id);
            first.priority = Some(Priority::Urgent);
            Ok(vec![first])
        }
    }

    #[test]
    fn test_fill_only_empty_fields() {
        let mut target = item("TODO: a");
        target.priority = Some(Priority::Low);
        let mut enrichment = Enrichment::baseline(&target.id);
        enrichment.labels = vec!["backend".into()];

        assert!(enrichment.fill(&mut target));
        assert_eq!(target.priority, Some(Priority::Low));
        assert_eq!(target.labels, vec!["backend".to_string()]);
        assert_eq!(target.urgency_score, Some(BASELINE_URGENCY));
        assert!(!enrichment.fill(&mut target));
    }

    #[tokio::test]
    async fn test_failure_degrades_to_baseline() {
        let items = vec![item("TODO: a"), item("TODO: b")];
        let out = enrich_or_baseline(&Failing, "p", &items).await;
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|e| e.priority == Some(Priority::Medium)));
    }

    #[tokio::test]
    async fn test_missing_answers_get_baseline() {
        let items = vec![item("TODO: a"), item("TODO: b")];
        let out = enrich_or_baseline(&Partial, "p", &items).await;
        assert_eq!(out[0].priority, Some(Priority::Urgent));
        assert_eq!(out[1], Enrichment::baseline(&items[1].id));
    }

    #[test]
    fn test_response_values_are_validated() {
        let response: EnrichResponse = serde_json::from_value(json!({
            "todos": [{
                "id": "a",
                "priority": "P1",
                "labels": ["ui", " "],
                "deadlineISO": "next tuesday",
                "urgencyScore": 4.2,
                "suggestedFiles": [{"path": "src/b.rs", "score": 0.8}],
                "modelMeta": {"mode": "baseline"}
            }]
        }))
        .unwrap();
        let enrichment = response.todos.into_iter().next().unwrap().into_enrichment();
        assert_eq!(enrichment.priority, Some(Priority::High));
        assert_eq!(enrichment.labels, vec!["ui".to_string()]);
        assert_eq!(enrichment.deadline, None);
        assert_eq!(enrichment.urgency_score, None);
        assert_eq!(enrichment.suggested_files.len(), 1);
    }

    #[test]
    fn test_request_shape() {
        let it = item("TODO: a");
        let request = EnrichRequest {
            project_id: "p",
            top_k: TOP_K,
            todos: vec![EnrichTodo {
                id: &it.id,
                text: &it.text,
                file_path: &it.file_path,
                status: it.status,
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["topK"], 5);
        assert_eq!(value["todos"][0]["filePath"], "src/a.rs");
        assert_eq!(value["todos"][0]["status"], "open");
    }
}
