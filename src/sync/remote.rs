//! Remote canonical store client.
//!
//! The remote holds one item list per project and exposes three calls:
//! list projects, fetch a project's items, and upsert a project's items.
//! Upserts are idempotent per item id.

use std::future::Future;
use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::types::{ProjectsResponse, RemoteError, SyncRequest, TodosResponse};
use crate::model::{ProjectRef, TrackedItem};

/// Path prefix of the tracker API on the backend.
pub const API_PREFIX: [&str; 2] = ["api", "todo-tracker"];

/// The remote canonical store.
pub trait RemoteStore: Send + Sync {
    /// All projects the remote knows.
    fn list_projects(&self) -> impl Future<Output = Result<Vec<ProjectRef>, RemoteError>> + Send;

    /// Raw item payloads of one project, not yet validated.
    ///
    /// A project that has never been pushed yields `RemoteError::NotFound`.
    fn get_project_items(
        &self,
        project_id: &str,
    ) -> impl Future<Output = Result<Vec<Value>, RemoteError>> + Send;

    /// Replace-or-insert the given items for a project.
    fn upsert_project_items(
        &self,
        project_id: &str,
        project_name: &str,
        items: &[TrackedItem],
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// HTTP implementation against the Busy Bee backend.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteStore {
    /// Create a client for `base_url` (e.g. `http://localhost:5050`).
    #[must_use]
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl RemoteStore for HttpRemoteStore {
    async fn list_projects(&self) -> Result<Vec<ProjectRef>, RemoteError> {
        let url = endpoint(&self.base_url, &["projects"])?;
        debug!(%url, "Listing remote projects");
        let body: ProjectsResponse = send_json(self.client.get(url), "projects").await?;
        Ok(body.projects)
    }

    async fn get_project_items(&self, project_id: &str) -> Result<Vec<Value>, RemoteError> {
        let url = endpoint(&self.base_url, &["projects", project_id, "todos"])?;
        debug!(%url, "Pulling remote items");
        let body: TodosResponse = send_json(self.client.get(url), project_id).await?;
        Ok(body.todos)
    }

    async fn upsert_project_items(
        &self,
        project_id: &str,
        project_name: &str,
        items: &[TrackedItem],
    ) -> Result<(), RemoteError> {
        let url = endpoint(&self.base_url, &["sync"])?;
        debug!(%url, count = items.len(), "Pushing items");
        let request = SyncRequest {
            project_id,
            project_name,
            todos: items,
        };
        let _: Value = send_json(self.client.post(url).json(&request), project_id).await?;
        Ok(())
    }
}

/// Build a client with request and connect timeouts.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .build()
        .unwrap_or_default()
}

/// `{base}/api/todo-tracker/{segments...}` with each segment percent-encoded.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, RemoteError> {
    let mut url = Url::parse(base)
        .map_err(|e| RemoteError::Offline(format!("invalid backend URL '{base}': {e}")))?;
    url.path_segments_mut()
        .map_err(|()| RemoteError::Offline(format!("backend URL '{base}' cannot be a base")))?
        .pop_if_empty()
        .extend(API_PREFIX)
        .extend(segments);
    Ok(url)
}

/// Send a request and decode a JSON body, classifying every failure.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    what: &str,
) -> Result<T, RemoteError> {
    let response = request
        .send()
        .await
        .map_err(|e| RemoteError::Offline(e.to_string()))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(RemoteError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| RemoteError::Offline(e.to_string()))?;
    if bytes.is_empty() {
        // Some endpoints answer 204 / empty 200.
        return serde_json::from_value(Value::Null)
            .map_err(|e| RemoteError::MalformedResponse(e.to_string()));
    }
    serde_json::from_slice(&bytes).map_err(|e| RemoteError::MalformedResponse(e.to_string()))
}
