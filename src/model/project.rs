//! Project identity models.
//!
//! A workspace starts with a locally derived project id. On first sync the
//! operator binds it to a canonical remote project, and that binding is
//! what every later sync uses.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A project as known to the remote canonical store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRef {
    pub project_id: String,
    pub project_name: String,
}

impl ProjectRef {
    /// Mint a new remote project reference for `name`.
    ///
    /// The remote creates projects implicitly on the first upsert, so the id
    /// is generated client-side.
    #[must_use]
    pub fn create(name: &str) -> Self {
        let id = format!("proj_{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
        Self {
            project_id: id,
            project_name: name.trim().to_string(),
        }
    }
}

/// Sticky mapping from a local workspace to a remote project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceBinding {
    /// Absolute workspace path the binding belongs to.
    pub workspace_path: String,
    pub project_id: String,
    pub project_name: String,
    pub bound_at: DateTime<Utc>,
}

impl WorkspaceBinding {
    #[must_use]
    pub fn new(workspace_path: &Path, project: &ProjectRef, now: DateTime<Utc>) -> Self {
        Self {
            workspace_path: workspace_path.to_string_lossy().to_string(),
            project_id: project.project_id.clone(),
            project_name: project.project_name.clone(),
            bound_at: now,
        }
    }

    #[must_use]
    pub fn project(&self) -> ProjectRef {
        ProjectRef {
            project_id: self.project_id.clone(),
            project_name: self.project_name.clone(),
        }
    }
}

/// Derive the local project id for an unbound workspace.
///
/// First 12 hex chars of SHA-256 over the workspace path.
#[must_use]
pub fn derive_project_id(workspace_root: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(workspace_root.to_string_lossy().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}
