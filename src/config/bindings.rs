//! Sticky workspace → remote project bindings.
//!
//! Bindings live in a single file under the global directory, keyed by the
//! canonical workspace path. A workspace is bound once, on its first sync,
//! and keeps that binding until it is cleared explicitly.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{ProjectRef, WorkspaceBinding};
use crate::storage::atomic_write;

/// File name of the registry under the global directory.
pub const BINDINGS_FILE: &str = "bindings.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct BindingsFile {
    #[serde(default)]
    bindings: BTreeMap<String, WorkspaceBinding>,
}

/// All bindings known on this machine.
#[derive(Debug)]
pub struct BindingRegistry {
    path: PathBuf,
    file: BindingsFile,
}

impl BindingRegistry {
    /// Load the registry from `<global_dir>/bindings.json`.
    ///
    /// A missing file is an empty registry.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file exists but cannot be read or parsed.
    /// It is never overwritten in that case.
    pub fn load(global_dir: &Path) -> Result<Self> {
        let path = global_dir.join(BINDINGS_FILE);
        let file = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                Error::Config(format!("Failed to parse {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BindingsFile::default(),
            Err(e) => {
                return Err(Error::Config(format!("Failed to read {}: {e}", path.display())));
            }
        };
        debug!(path = %path.display(), count = file.bindings.len(), "Loaded bindings");
        Ok(Self { path, file })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The binding of `workspace`, if any.
    #[must_use]
    pub fn get(&self, workspace: &Path) -> Option<&WorkspaceBinding> {
        self.file.bindings.get(&key(workspace))
    }

    /// All bindings, ordered by workspace path.
    pub fn all(&self) -> impl Iterator<Item = &WorkspaceBinding> {
        self.file.bindings.values()
    }

    /// Bind `workspace` to `project` and persist.
    ///
    /// Re-binding to the same project is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyBound` if the workspace is bound to a different
    /// project, or an I/O error if the registry cannot be written.
    pub fn bind(
        &mut self,
        workspace: &Path,
        project: &ProjectRef,
        now: DateTime<Utc>,
    ) -> Result<WorkspaceBinding> {
        let key = key(workspace);
        if let Some(existing) = self.file.bindings.get(&key) {
            if existing.project_id == project.project_id {
                return Ok(existing.clone());
            }
            return Err(Error::AlreadyBound {
                workspace: key,
                project_id: existing.project_id.clone(),
            });
        }

        let binding = WorkspaceBinding::new(Path::new(&key), project, now);
        self.file.bindings.insert(key.clone(), binding.clone());
        if let Err(e) = self.save() {
            self.file.bindings.remove(&key);
            return Err(e);
        }
        info!(workspace = %key, project = %project.project_id, "Bound workspace");
        Ok(binding)
    }

    /// Remove the binding of `workspace` and persist.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the registry cannot be written.
    pub fn clear(&mut self, workspace: &Path) -> Result<Option<WorkspaceBinding>> {
        let key = key(workspace);
        let Some(removed) = self.file.bindings.remove(&key) else {
            return Ok(None);
        };
        if let Err(e) = self.save() {
            self.file.bindings.insert(key, removed);
            return Err(e);
        }
        Ok(Some(removed))
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.file)?;
        atomic_write(&self.path, &json)?;
        Ok(())
    }
}

/// Registry key for a workspace: its canonical path when it exists.
fn key(workspace: &Path) -> String {
    workspace
        .canonicalize()
        .unwrap_or_else(|_| workspace.to_path_buf())
        .to_string_lossy()
        .to_string()
}
