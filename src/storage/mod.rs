//! Local persistence for project databases.
//!
//! This module provides the persistence layer with:
//! - Atomic writes (temp sibling, fsync, rename)
//! - Two interchangeable backends: project-local and profile-global
//! - A manager that falls back from the first to the second
//! - Additive schema migrations applied on load
//!
//! # Submodules
//!
//! - [`atomic`] - Torn-free single-file writes
//! - [`workspace`] - Backend under `<workspace>/.busybee/`
//! - [`global`] - Backend under the profile-global directory
//! - [`manager`] - Load/save orchestration with fallback
//! - [`migrations`] - Schema upgrades and normalization

pub mod atomic;
pub mod global;
pub mod manager;
pub mod migrations;
pub mod workspace;

use std::path::PathBuf;

use serde::Serialize;

pub use atomic::atomic_write;
pub use global::GlobalStorage;
pub use manager::{LoadResult, StorageManager};
pub use migrations::{migrate, MigrationResult};
pub use workspace::WorkspaceStorage;

/// File name of the serialized database in both backends.
pub const DB_FILE_NAME: &str = "todos.json";

/// Which backend a load or save ended up using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// `<workspace>/.busybee/todos.json`
    Workspace,
    /// `<global dir>/projects/<project id>/todos.json`
    Global,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Workspace => write!(f, "workspace"),
            Self::Global => write!(f, "global"),
        }
    }
}

/// Storage-specific errors.
///
/// "Not found" is not an error: backends return `Ok(None)` for a fresh
/// project.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O failure on a backend (read-only filesystem, permissions, ...).
    #[error("{backend} storage unavailable: {source}")]
    BackendUnavailable {
        backend: StorageMode,
        #[source]
        source: std::io::Error,
    },

    /// The stored blob could not be parsed.
    #[error("{backend} storage holds corrupt data: {message}")]
    CorruptData { backend: StorageMode, message: String },

    /// Both backends failed to persist.
    #[error("all storage backends failed (workspace: {workspace}; global: {global})")]
    AllBackendsFailed { workspace: String, global: String },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A place a serialized project database can be kept.
pub trait StorageBackend {
    /// Which mode this backend represents.
    fn mode(&self) -> StorageMode;

    /// Path of the database file for `project_id`.
    fn path_for(&self, project_id: &str) -> PathBuf;

    /// Read the raw blob. `Ok(None)` when nothing has been stored yet.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` for any I/O failure other than not-found.
    fn read(&self, project_id: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Persist the raw blob atomically.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the directory or file cannot be written.
    fn write(&self, project_id: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Move an unreadable blob aside so the next write cannot destroy it.
    ///
    /// Returns where it was moved, or `None` if there was nothing to move.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the rename fails.
    fn quarantine(&self, project_id: &str) -> StorageResult<Option<PathBuf>> {
        let path = self.path_for(project_id);
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let aside = path.with_file_name(format!("{DB_FILE_NAME}.corrupt-{stamp}"));
        match std::fs::rename(&path, &aside) {
            Ok(()) => Ok(Some(aside)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::BackendUnavailable {
                backend: self.mode(),
                source,
            }),
        }
    }
}

/// Shared read helper: NotFound maps to `Ok(None)`.
pub(crate) fn read_blob(mode: StorageMode, path: &std::path::Path) -> StorageResult<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StorageError::BackendUnavailable {
            backend: mode,
            source,
        }),
    }
}

/// Shared write helper over [`atomic_write`].
pub(crate) fn write_blob(mode: StorageMode, path: &std::path::Path, bytes: &[u8]) -> StorageResult<()> {
    atomic_write(path, bytes).map_err(|source| StorageError::BackendUnavailable {
        backend: mode,
        source,
    })
}
