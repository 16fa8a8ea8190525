//! Profile-global storage backend.
//!
//! Stores one database per project under the tool's global directory,
//! keyed explicitly by project id. This is the fallback when the workspace
//! cannot be written (read-only mounts, restricted sandboxes).

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{read_blob, write_blob, StorageBackend, StorageMode, StorageResult, DB_FILE_NAME};

/// Backend under `<global dir>/projects/`.
#[derive(Debug, Clone)]
pub struct GlobalStorage {
    base: PathBuf,
}

impl GlobalStorage {
    /// Create a backend rooted at the global directory (e.g. `~/.busybee`).
    #[must_use]
    pub fn new(global_dir: &Path) -> Self {
        Self {
            base: global_dir.join("projects"),
        }
    }

    fn dir(&self, project_id: &str) -> PathBuf {
        self.base.join(sanitize_key(project_id))
    }
}

impl StorageBackend for GlobalStorage {
    fn mode(&self) -> StorageMode {
        StorageMode::Global
    }

    fn path_for(&self, project_id: &str) -> PathBuf {
        self.dir(project_id).join(DB_FILE_NAME)
    }

    fn read(&self, project_id: &str) -> StorageResult<Option<Vec<u8>>> {
        read_blob(self.mode(), &self.path_for(project_id))
    }

    fn write(&self, project_id: &str, bytes: &[u8]) -> StorageResult<()> {
        let path = self.path_for(project_id);
        write_blob(self.mode(), &path, bytes)?;
        debug!(path = %path.display(), "global write OK");
        Ok(())
    }
}

/// Sanitize a project id for use as a directory name.
fn sanitize_key(key: &str) -> String {
    let sanitized: String = key
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect();

    match sanitized.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => sanitized,
    }
}
