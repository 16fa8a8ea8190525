//! Load/save orchestration across the two storage backends.
//!
//! The workspace backend is tried first and the global backend is the
//! fallback. Loaded documents pass through [`migrate`] and are written back
//! when the migration changed them.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::migrations::migrate;
use super::{GlobalStorage, StorageBackend, StorageError, StorageMode, StorageResult, WorkspaceStorage};
use crate::model::ProjectDatabase;

type Backend = Box<dyn StorageBackend + Send + Sync>;

/// Result of [`StorageManager::load`].
#[derive(Debug)]
pub struct LoadResult {
    /// Backend the data came from (or, when `data` is `None`, the backend
    /// that was consulted first).
    pub mode: StorageMode,
    /// `None` for a fresh project.
    pub data: Option<ProjectDatabase>,
    /// Corrupt files moved aside during this load.
    pub quarantined: Vec<PathBuf>,
}

/// Outcome of reading a single backend.
enum ReadOutcome {
    Found(ProjectDatabase),
    Missing,
}

/// Persists one workspace's database.
pub struct StorageManager {
    primary: Backend,
    fallback: Backend,
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager")
            .field("primary", &self.primary.mode())
            .field("fallback", &self.fallback.mode())
            .finish()
    }
}

impl StorageManager {
    /// Manager over `<workspace_root>/.busybee/` with `<global_dir>/projects/`
    /// as fallback.
    #[must_use]
    pub fn new(workspace_root: &Path, global_dir: &Path) -> Self {
        Self::with_backends(
            Box::new(WorkspaceStorage::new(workspace_root)),
            Box::new(GlobalStorage::new(global_dir)),
        )
    }

    /// Manager over arbitrary backends.
    #[must_use]
    pub fn with_backends(primary: Backend, fallback: Backend) -> Self {
        Self { primary, fallback }
    }

    /// Where the database for `project_id` lives in each backend.
    #[must_use]
    pub fn paths(&self, project_id: &str) -> [(StorageMode, PathBuf); 2] {
        [
            (self.primary.mode(), self.primary.path_for(project_id)),
            (self.fallback.mode(), self.fallback.path_for(project_id)),
        ]
    }

    /// Load the database for `project_id`.
    ///
    /// The workspace backend is read first. When it has no data, or fails
    /// with an I/O error, the global backend is consulted. Corrupt blobs are
    /// quarantined and treated as missing.
    ///
    /// # Errors
    ///
    /// Returns an error only if the global backend fails after the
    /// workspace backend already failed.
    pub fn load(&self, project_id: &str) -> StorageResult<LoadResult> {
        let mut quarantined = Vec::new();

        let primary_err = match read_backend(self.primary.as_ref(), project_id, &mut quarantined) {
            Ok(ReadOutcome::Found(db)) => {
                return Ok(LoadResult {
                    mode: self.primary.mode(),
                    data: Some(db),
                    quarantined,
                });
            }
            Ok(ReadOutcome::Missing) => None,
            Err(e) => {
                warn!(backend = %self.primary.mode(), error = %e, "Read failed, falling back");
                Some(e)
            }
        };

        match read_backend(self.fallback.as_ref(), project_id, &mut quarantined) {
            Ok(ReadOutcome::Found(db)) => Ok(LoadResult {
                mode: self.fallback.mode(),
                data: Some(db),
                quarantined,
            }),
            Ok(ReadOutcome::Missing) => Ok(LoadResult {
                mode: if primary_err.is_some() {
                    self.fallback.mode()
                } else {
                    self.primary.mode()
                },
                data: None,
                quarantined,
            }),
            Err(e) if primary_err.is_none() => {
                // Workspace is healthy and empty; an unreadable fallback does not matter.
                warn!(backend = %self.fallback.mode(), error = %e, "Fallback read failed");
                Ok(LoadResult {
                    mode: self.primary.mode(),
                    data: None,
                    quarantined,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Persist `db`, returning the backend that accepted it.
    ///
    /// # Errors
    ///
    /// Returns `AllBackendsFailed` if neither backend could be written.
    pub fn save(&self, project_id: &str, db: &ProjectDatabase) -> StorageResult<StorageMode> {
        let bytes = serde_json::to_vec_pretty(db)?;

        let primary_err = match self.primary.write(project_id, &bytes) {
            Ok(()) => return Ok(self.primary.mode()),
            Err(e) => {
                warn!(backend = %self.primary.mode(), error = %e, "Write failed, falling back");
                e
            }
        };

        match self.fallback.write(project_id, &bytes) {
            Ok(()) => {
                info!(backend = %self.fallback.mode(), "Saved to fallback storage");
                Ok(self.fallback.mode())
            }
            Err(fallback_err) => Err(StorageError::AllBackendsFailed {
                workspace: primary_err.to_string(),
                global: fallback_err.to_string(),
            }),
        }
    }
}

/// Read, parse and migrate one backend's blob.
fn read_backend(
    backend: &(dyn StorageBackend + Send + Sync),
    project_id: &str,
    quarantined: &mut Vec<PathBuf>,
) -> StorageResult<ReadOutcome> {
    let Some(bytes) = backend.read(project_id)? else {
        debug!(backend = %backend.mode(), "No database yet");
        return Ok(ReadOutcome::Missing);
    };

    match decode(&bytes, project_id) {
        Ok((db, migrated)) => {
            if migrated {
                match serde_json::to_vec_pretty(&db)
                    .map_err(StorageError::from)
                    .and_then(|upgraded| backend.write(project_id, &upgraded))
                {
                    Ok(()) => info!(
                        backend = %backend.mode(),
                        version = db.meta.schema_version,
                        "Wrote back migrated database"
                    ),
                    Err(e) => warn!(backend = %backend.mode(), error = %e, "Could not write back migrated database"),
                }
            }
            Ok(ReadOutcome::Found(db))
        }
        Err(message) => {
            let corrupt = StorageError::CorruptData {
                backend: backend.mode(),
                message,
            };
            warn!(error = %corrupt, "Quarantining unreadable database");
            if let Some(aside) = backend.quarantine(project_id)? {
                warn!(path = %aside.display(), "Corrupt database moved aside");
                quarantined.push(aside);
            }
            Ok(ReadOutcome::Missing)
        }
    }
}

/// Parse bytes into a database. Returns whether the document was changed on
/// the way in and needs to be written back.
fn decode(bytes: &[u8], project_id: &str) -> Result<(ProjectDatabase, bool), String> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    let result = migrate(value)?;
    let mut db: ProjectDatabase = serde_json::from_value(result.value).map_err(|e| e.to_string())?;

    let mut migrated = result.migrated;
    if db.meta.project_id.is_empty() {
        db.meta.project_id = project_id.to_string();
        migrated = true;
    }
    Ok((db, migrated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackedItem;
    use chrono::{TimeZone, Utc};
    use std::fs;
    use tempfile::TempDir;

    struct BrokenBackend(StorageMode);

    impl StorageBackend for BrokenBackend {
        fn mode(&self) -> StorageMode {
            self.0
        }

        fn path_for(&self, _project_id: &str) -> PathBuf {
            PathBuf::from("/nonexistent/todos.json")
        }

        fn read(&self, _project_id: &str) -> StorageResult<Option<Vec<u8>>> {
            Err(StorageError::BackendUnavailable {
                backend: self.0,
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }

        fn write(&self, _project_id: &str, _bytes: &[u8]) -> StorageResult<()> {
            Err(StorageError::BackendUnavailable {
                backend: self.0,
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }
    }

    fn sample_db() -> ProjectDatabase {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let mut db = ProjectDatabase::new("p1", "Alpha", now);
        db.set_items([TrackedItem::scanned("p1", "src/lib.rs", 4, "TODO: tidy", now)]);
        db
    }

    #[test]
    fn test_fresh_project_loads_empty_workspace() {
        let ws = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let manager = StorageManager::new(ws.path(), home.path());

        let loaded = manager.load("p1").unwrap();
        assert_eq!(loaded.mode, StorageMode::Workspace);
        assert!(loaded.data.is_none());
    }

    #[test]
    fn test_save_and_load_workspace() {
        let ws = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let manager = StorageManager::new(ws.path(), home.path());
        let db = sample_db();

        assert_eq!(manager.save("p1", &db).unwrap(), StorageMode::Workspace);
        let loaded = manager.load("p1").unwrap();
        assert_eq!(loaded.mode, StorageMode::Workspace);
        assert_eq!(loaded.data.unwrap(), db);
        assert!(!home.path().join("projects").exists());
    }

    #[test]
    fn test_unwritable_workspace_falls_back_to_global() {
        let tmp = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        // A regular file where the workspace directory should be.
        let ws_root = tmp.path().join("readonly-ws");
        fs::write(&ws_root, "not a directory").unwrap();
        let manager = StorageManager::new(&ws_root, home.path());
        let db = sample_db();

        assert_eq!(manager.save("p1", &db).unwrap(), StorageMode::Global);

        let loaded = manager.load("p1").unwrap();
        assert_eq!(loaded.mode, StorageMode::Global);
        assert_eq!(loaded.data.unwrap(), db);
    }

    #[test]
    fn test_broken_primary_falls_back_on_read_and_write() {
        let home = TempDir::new().unwrap();
        let manager = StorageManager::with_backends(
            Box::new(BrokenBackend(StorageMode::Workspace)),
            Box::new(GlobalStorage::new(home.path())),
        );

        let empty = manager.load("p1").unwrap();
        assert_eq!(empty.mode, StorageMode::Global);
        assert!(empty.data.is_none());

        let db = sample_db();
        assert_eq!(manager.save("p1", &db).unwrap(), StorageMode::Global);
        assert_eq!(manager.load("p1").unwrap().data.unwrap(), db);
    }

    #[test]
    fn test_both_backends_failing() {
        let manager = StorageManager::with_backends(
            Box::new(BrokenBackend(StorageMode::Workspace)),
            Box::new(BrokenBackend(StorageMode::Global)),
        );
        let err = manager.save("p1", &sample_db()).unwrap_err();
        assert!(matches!(err, StorageError::AllBackendsFailed { .. }));
        assert!(manager.load("p1").is_err());
    }

    #[test]
    fn test_corrupt_blob_is_quarantined() {
        let ws = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let manager = StorageManager::new(ws.path(), home.path());
        let path = ws.path().join(".busybee").join("todos.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ this is not json").unwrap();

        let loaded = manager.load("p1").unwrap();
        assert!(loaded.data.is_none());
        assert_eq!(loaded.quarantined.len(), 1);
        assert_eq!(fs::read_to_string(&loaded.quarantined[0]).unwrap(), "{ this is not json");
        assert!(!path.exists());

        // The next save does not touch the quarantined copy.
        manager.save("p1", &sample_db()).unwrap();
        assert!(loaded.quarantined[0].exists());
    }

    #[test]
    fn test_legacy_document_is_migrated_and_written_back() {
        let ws = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let manager = StorageManager::new(ws.path(), home.path());
        let path = ws.path().join(".busybee").join("todos.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            r#"[{"id":"a","text":"legacy","filePath":"f.rs","line":3,"status":"open"}]"#,
        )
        .unwrap();

        let loaded = manager.load("p1").unwrap();
        let db = loaded.data.unwrap();
        assert_eq!(db.project_id(), "p1");
        assert_eq!(db.todos["a"].text, "legacy");

        let on_disk: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk["meta"]["schemaVersion"], 2);
        assert_eq!(on_disk["todos"][0]["source"], "scan");
    }

    #[test]
    fn test_workspace_copy_wins_over_stale_global() {
        let ws = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let manager = StorageManager::new(ws.path(), home.path());

        let mut stale = sample_db();
        stale.meta.project_name = "stale".into();
        GlobalStorage::new(home.path())
            .write("p1", &serde_json::to_vec(&stale).unwrap())
            .unwrap();
        manager.save("p1", &sample_db()).unwrap();

        let loaded = manager.load("p1").unwrap();
        assert_eq!(loaded.mode, StorageMode::Workspace);
        assert_eq!(loaded.data.unwrap().project_name(), "Alpha");
    }
}
