//! Project-local storage backend.
//!
//! Keeps the database in a hidden directory inside the workspace root,
//! which makes it portable and easy to inspect. The workspace root is the
//! key, so the project id is ignored.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{read_blob, write_blob, StorageBackend, StorageError, StorageMode, StorageResult, DB_FILE_NAME};

/// Directory created inside the workspace root.
pub const WORKSPACE_DIR: &str = ".busybee";

/// Backend rooted at one workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceStorage {
    root: PathBuf,
}

impl WorkspaceStorage {
    #[must_use]
    pub fn new(workspace_root: &Path) -> Self {
        Self {
            root: workspace_root.to_path_buf(),
        }
    }

    /// The `.busybee/` directory of this workspace.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        self.root.join(WORKSPACE_DIR)
    }
}

impl StorageBackend for WorkspaceStorage {
    fn mode(&self) -> StorageMode {
        StorageMode::Workspace
    }

    fn path_for(&self, _project_id: &str) -> PathBuf {
        self.dir().join(DB_FILE_NAME)
    }

    fn read(&self, project_id: &str) -> StorageResult<Option<Vec<u8>>> {
        read_blob(self.mode(), &self.path_for(project_id))
    }

    fn write(&self, project_id: &str, bytes: &[u8]) -> StorageResult<()> {
        let path = self.path_for(project_id);
        write_blob(self.mode(), &path, bytes)?;
        ensure_gitignore(&self.dir()).map_err(|source| StorageError::BackendUnavailable {
            backend: self.mode(),
            source,
        })?;
        debug!(path = %path.display(), "workspace write OK");
        Ok(())
    }
}

/// Generate .gitignore content for the `.busybee` directory.
///
/// The directory holds local tracker state only, so everything in it is
/// ignored, including this file.
#[must_use]
pub fn gitignore_content() -> &'static str {
    "# Busy Bee TODO tracker local state\n*\n"
}

/// Ensure .gitignore exists in the workspace storage directory.
///
/// An existing file is never modified (the user may have customized it).
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn ensure_gitignore(dir: &Path) -> std::io::Result<()> {
    let gitignore_path = dir.join(".gitignore");

    if gitignore_path.exists() {
        return Ok(());
    }

    fs::create_dir_all(dir)?;
    let mut file = File::create(&gitignore_path)?;
    file.write_all(gitignore_content().as_bytes())?;
    file.sync_all()?;

    Ok(())
}
