//! Orchestration of local mutations, persistence and remote sync.
//!
//! Every mutating operation follows the same path: mutate the store, enrich
//! when an enricher is configured, persist through the storage manager, then
//! push to the remote on a best-effort basis. An explicit [`sync`] pulls,
//! merges and pushes the whole project.
//!
//! [`sync`]: SyncCoordinator::sync

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::hash::{content_hash, has_changed};
use super::merge::merge;
use super::remote::RemoteStore;
use super::types::{validate_remote_items, PushOutcome, RemoteError, SyncOutcome, SyncReport};
use crate::config::BindingRegistry;
use crate::enrich::{enrich_or_baseline, Enricher, HttpEnricher};
use crate::error::{Error, Result};
use crate::model::{derive_project_id, ProjectRef, TodoStatus, TrackedItem, WorkspaceBinding};
use crate::scan::{read_source, relative_path, scan_workspace, Scanner, Source};
use crate::storage::{StorageManager, StorageMode};
use crate::store::{ItemPatch, TodoStore, UpsertStats};

// ── Re-entrancy gate ─────────────────────────────────────────

/// Shared "sync in flight" flag.
///
/// Clones share the flag. [`SyncGate::try_enter`] hands out at most one
/// guard at a time; dropping the guard opens the gate again.
#[derive(Debug, Clone, Default)]
pub struct SyncGate {
    busy: Arc<AtomicBool>,
}

/// Held while a sync runs.
#[derive(Debug)]
pub struct SyncGuard {
    busy: Arc<AtomicBool>,
}

impl SyncGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the gate, or `None` if a sync is already running.
    #[must_use]
    pub fn try_enter(&self) -> Option<SyncGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

// ── Operator choices and reports ─────────────────────────────

/// How an unbound workspace should be bound on its first sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingChoice {
    /// Create a new remote project with this name.
    Create(String),
    /// Use an existing remote project by id.
    Existing(String),
}

/// What happened after a local mutation was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Committed {
    pub storage: StorageMode,
    pub push: PushOutcome,
    /// Items that received enrichment values.
    pub enriched: usize,
}

/// Snapshot for `bbt status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub workspace: String,
    pub project_id: String,
    pub project_name: String,
    pub binding: Option<WorkspaceBinding>,
    pub storage: StorageMode,
    pub storage_paths: Vec<(StorageMode, PathBuf)>,
    pub total: usize,
    pub open: usize,
    pub in_progress: usize,
    pub resolved: usize,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub pending_push: bool,
    pub quarantined: Vec<PathBuf>,
}

// ── Coordinator ──────────────────────────────────────────────

/// Owns one workspace's store and everything needed to persist and sync it.
pub struct SyncCoordinator<R, E = HttpEnricher> {
    workspace: PathBuf,
    workspace_name: String,
    store: TodoStore,
    storage: StorageManager,
    remote: R,
    enricher: Option<E>,
    bindings: BindingRegistry,
    gate: SyncGate,
    offline: bool,
    last_mode: StorageMode,
    quarantined: Vec<PathBuf>,
}

impl<R, E> std::fmt::Debug for SyncCoordinator<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("workspace", &self.workspace)
            .field("project_id", &self.store.project_id())
            .field("items", &self.store.len())
            .field("offline", &self.offline)
            .finish_non_exhaustive()
    }
}

impl<R: RemoteStore, E: Enricher> SyncCoordinator<R, E> {
    /// Open the coordinator for `workspace`.
    ///
    /// The project id is the bound remote project's when a binding exists,
    /// otherwise one derived from the workspace path.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an unreadable binding registry and `Storage` if
    /// neither backend can be read.
    pub fn open(
        workspace: &Path,
        workspace_name: &str,
        global_dir: &Path,
        remote: R,
        enricher: Option<E>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let bindings = BindingRegistry::load(global_dir)?;
        let local_id = derive_project_id(workspace);
        let project = bindings.get(workspace).map_or_else(
            || ProjectRef {
                project_id: local_id.clone(),
                project_name: workspace_name.to_string(),
            },
            WorkspaceBinding::project,
        );

        let storage = StorageManager::new(workspace, global_dir);
        let mut loaded = storage.load(&project.project_id)?;
        if loaded.data.is_none() && project.project_id != local_id {
            // Data saved to the global fallback before the workspace was bound.
            let earlier = storage.load(&local_id)?;
            loaded.quarantined.extend(earlier.quarantined);
            if earlier.data.is_some() {
                loaded.data = earlier.data;
                loaded.mode = earlier.mode;
            }
        }

        let mut store = loaded.data.map_or_else(
            || TodoStore::empty(&project.project_id, &project.project_name, now),
            TodoStore::new,
        );
        store.rekey(&project.project_id, &project.project_name, now);
        debug!(
            workspace = %workspace.display(),
            project = %project.project_id,
            items = store.len(),
            mode = %loaded.mode,
            "Opened workspace"
        );

        Ok(Self {
            workspace: workspace.to_path_buf(),
            workspace_name: workspace_name.to_string(),
            store,
            storage,
            remote,
            enricher,
            bindings,
            gate: SyncGate::new(),
            offline: false,
            last_mode: loaded.mode,
            quarantined: loaded.quarantined,
        })
    }

    /// Never contact the remote.
    #[must_use]
    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Share a re-entrancy gate with other coordinators.
    #[must_use]
    pub fn with_gate(mut self, gate: SyncGate) -> Self {
        self.gate = gate;
        self
    }

    #[must_use]
    pub fn store(&self) -> &TodoStore {
        &self.store
    }

    #[must_use]
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    #[must_use]
    pub fn binding(&self) -> Option<&WorkspaceBinding> {
        self.bindings.get(&self.workspace)
    }

    /// Corrupt files moved aside while opening.
    #[must_use]
    pub fn quarantined(&self) -> &[PathBuf] {
        &self.quarantined
    }

    #[must_use]
    pub fn status(&self) -> StatusReport {
        let db = self.store.database();
        let count = |status: TodoStatus| self.store.items().filter(|i| i.status == status).count();
        let pending_push = content_hash(&db.item_list()).map_or(true, |hash| {
            has_changed(&hash, db.meta.backend_sync_info.last_pushed_hash.as_deref())
        });
        StatusReport {
            workspace: self.workspace.to_string_lossy().to_string(),
            project_id: db.project_id().to_string(),
            project_name: db.project_name().to_string(),
            binding: self.binding().cloned(),
            storage: self.last_mode,
            storage_paths: self.storage.paths(db.project_id()).to_vec(),
            total: self.store.len(),
            open: count(TodoStatus::Open),
            in_progress: count(TodoStatus::InProgress),
            resolved: count(TodoStatus::Resolved),
            last_synced_at: db.meta.backend_sync_info.last_synced_at,
            pending_push,
            quarantined: self.quarantined.clone(),
        }
    }

    // ── Mutations ────────────────────────────────────────────

    /// Re-scan one file after it was saved.
    ///
    /// `contents` is read from disk when not supplied; a missing file scans
    /// as empty, which auto-resolves its scan items. A file that exists but
    /// cannot be read (binary, oversized, not UTF-8) leaves its items as
    /// they are.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a file outside the workspace and
    /// `Storage` if the result cannot be persisted.
    pub async fn on_file_saved<S: Scanner>(
        &mut self,
        scanner: &S,
        path: &Path,
        contents: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(UpsertStats, Committed)> {
        let rel = relative_path(&self.workspace, path)?;
        let read;
        let contents = match contents {
            Some(c) => Some(c),
            None => match read_source(&self.workspace.join(&rel)) {
                Source::Text(text) => {
                    read = text;
                    Some(read.as_str())
                }
                Source::Missing => Some(""),
                Source::Skipped => None,
            },
        };
        let stats = match contents {
            Some(contents) => {
                let fresh = scanner.scan(contents, self.store.project_id(), &rel, now);
                self.store.upsert_from_file(&rel, fresh, now)
            }
            None => {
                debug!(file = %rel, "File not readable; keeping its items");
                UpsertStats::default()
            }
        };
        let committed = self.commit(now).await?;
        Ok((stats, committed))
    }

    /// Re-scan the whole workspace.
    ///
    /// Returns the upsert counts and the number of files scanned.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the result cannot be persisted.
    pub async fn scan_workspace<S: Scanner>(
        &mut self,
        scanner: &S,
        exclude: &[String],
        now: DateTime<Utc>,
    ) -> Result<(UpsertStats, usize, Committed)> {
        let project_id = self.store.project_id().to_string();
        let scan = scan_workspace(scanner, &self.workspace, exclude, &project_id, now).await;
        let stats = self.store.replace_all(scan.items, &scan.skipped, now);
        let committed = self.commit(now).await?;
        Ok((stats, scan.files, committed))
    }

    /// Record a TODO by hand.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for empty text or line 0, `InvalidArgument` for a
    /// file outside the workspace.
    pub async fn add_manual(
        &mut self,
        text: &str,
        file: &str,
        line: u32,
        now: DateTime<Utc>,
    ) -> Result<(TrackedItem, Committed)> {
        let rel = relative_path(&self.workspace, Path::new(file))?;
        let id = self.store.add_manual(text, &rel, line, now)?.id.clone();
        self.finish(&id, now).await
    }

    /// Change an item's status.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound` if the id does not resolve.
    pub async fn set_status(
        &mut self,
        id: &str,
        status: TodoStatus,
        now: DateTime<Utc>,
    ) -> Result<(TrackedItem, Committed)> {
        let id = self.store.set_status(id, status, now)?.id.clone();
        self.finish(&id, now).await
    }

    /// # Errors
    ///
    /// Returns `ItemNotFound` if the id does not resolve.
    pub async fn mark_resolved(
        &mut self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<(TrackedItem, Committed)> {
        self.set_status(id, TodoStatus::Resolved, now).await
    }

    /// Apply a manual edit.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a bad patch and `ItemNotFound` if the id does
    /// not resolve.
    pub async fn apply_edit(
        &mut self,
        id: &str,
        patch: &ItemPatch,
        now: DateTime<Utc>,
    ) -> Result<(TrackedItem, Committed)> {
        let id = self.store.apply_edit(id, patch, now)?.id.clone();
        self.finish(&id, now).await
    }

    async fn finish(&mut self, id: &str, now: DateTime<Utc>) -> Result<(TrackedItem, Committed)> {
        let committed = self.commit(now).await?;
        let item = self
            .store
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ItemNotFound { id: id.to_string() })?;
        Ok((item, committed))
    }

    /// Enrich, persist, push.
    async fn commit(&mut self, now: DateTime<Utc>) -> Result<Committed> {
        let enriched = self.enrich_pending(now).await;
        let storage = self.persist()?;
        let push = self.push_best_effort().await;
        Ok(Committed {
            storage,
            push,
            enriched,
        })
    }

    /// Enrich unresolved items that still lack a priority or urgency.
    async fn enrich_pending(&mut self, now: DateTime<Utc>) -> usize {
        if self.offline {
            return 0;
        }
        let Some(enricher) = &self.enricher else {
            return 0;
        };
        let pending: Vec<TrackedItem> = self
            .store
            .items()
            .filter(|i| !i.is_resolved() && (i.priority.is_none() || i.urgency_score.is_none()))
            .cloned()
            .collect();
        if pending.is_empty() {
            return 0;
        }
        let enrichments = enrich_or_baseline(enricher, self.store.project_id(), &pending).await;
        self.store.merge_enrichment(&enrichments, now)
    }

    fn persist(&mut self) -> Result<StorageMode> {
        let mode = self
            .storage
            .save(self.store.project_id(), self.store.database())?;
        self.last_mode = mode;
        Ok(mode)
    }

    /// Push the full item set if bound and changed since the last push.
    ///
    /// Never fails: problems are logged and reported in the outcome.
    pub async fn push_best_effort(&mut self) -> PushOutcome {
        if self.offline {
            return PushOutcome::Disabled;
        }
        let Some(project) = self.binding().map(WorkspaceBinding::project) else {
            return PushOutcome::NotBound;
        };

        let items = self.store.database().item_list();
        let hash = match content_hash(&items) {
            Ok(hash) => hash,
            Err(e) => return PushOutcome::Failed { reason: e.to_string() },
        };
        let last = self.store.database().meta.backend_sync_info.last_pushed_hash.as_deref();
        if !has_changed(&hash, last) {
            return PushOutcome::Unchanged;
        }

        match self
            .remote
            .upsert_project_items(&project.project_id, &project.project_name, &items)
            .await
        {
            Ok(()) => {
                self.record_pushed(hash);
                debug!(project = %project.project_id, count = items.len(), "Pushed items");
                PushOutcome::Pushed
            }
            Err(e) => {
                warn!(project = %project.project_id, error = %e, "Push failed; local state kept");
                PushOutcome::Failed { reason: e.to_string() }
            }
        }
    }

    fn record_pushed(&mut self, hash: String) {
        self.store.database_mut().meta.backend_sync_info.last_pushed_hash = Some(hash);
        if let Err(e) = self.persist() {
            warn!(error = %e, "Could not record push bookkeeping");
        }
    }

    // ── Remote ───────────────────────────────────────────────

    /// Remote projects available for binding.
    ///
    /// # Errors
    ///
    /// Returns `Remote` when offline or the remote fails.
    pub async fn list_remote_projects(&self) -> Result<Vec<ProjectRef>> {
        if self.offline {
            return Err(RemoteError::Offline("remote disabled by --offline".into()).into());
        }
        Ok(self.remote.list_projects().await?)
    }

    /// Forget this workspace's binding. Local items are kept.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the registry cannot be written.
    pub fn clear_binding(&mut self) -> Result<Option<WorkspaceBinding>> {
        let removed = self.bindings.clear(&self.workspace)?;
        if let Some(binding) = &removed {
            info!(project = %binding.project_id, "Cleared workspace binding");
        }
        Ok(removed)
    }

    /// Pull, merge, persist and push the whole project.
    ///
    /// The first sync of an unbound workspace needs `choice`; afterwards the
    /// binding is reused and `choice` may be omitted.
    ///
    /// # Errors
    ///
    /// - `NotBound` when unbound and no choice was given
    /// - `AlreadyBound` when the choice conflicts with the binding
    /// - `ProjectNotFound` for an unknown existing project
    /// - `Remote` when the remote rejects a request or answers garbage
    /// - `Storage` when the merged state cannot be persisted
    ///
    /// An unreachable remote is not an error: it yields
    /// [`SyncOutcome::Offline`] and leaves local state untouched.
    pub async fn sync(
        &mut self,
        choice: Option<BindingChoice>,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome> {
        let Some(_guard) = self.gate.try_enter() else {
            debug!("Sync already in flight; skipping");
            return Ok(SyncOutcome::Skipped);
        };
        if self.offline {
            return Ok(SyncOutcome::Offline {
                reason: "remote disabled by --offline".into(),
            });
        }

        let project = match self.resolve_project(choice).await {
            Ok(project) => project,
            Err(Error::Remote(e)) if e.is_offline() => return Ok(offline(&e)),
            Err(e) => return Err(e),
        };

        // Pull. Nothing local changes before this succeeds.
        let raw = match self.remote.get_project_items(&project.project_id).await {
            Ok(raw) => raw,
            Err(RemoteError::NotFound(_)) => Vec::new(),
            Err(e) if e.is_offline() => return Ok(offline(&e)),
            Err(e) => return Err(e.into()),
        };
        let (remote_items, rejected) = validate_remote_items(raw);
        for reason in &rejected {
            warn!(project = %project.project_id, %reason, "Rejected remote item");
        }

        self.bindings.bind(&self.workspace, &project, now)?;
        self.store.rekey(&project.project_id, &project.project_name, now);

        let local_items = self.store.database().item_list();
        let outcome = merge(&local_items, &remote_items);
        let stats = outcome.stats;
        self.store.set_items(outcome.items, now);
        let enriched = self.enrich_pending(now).await;
        let storage = self.persist()?;

        let items = self.store.database().item_list();
        let hash = content_hash(&items)?;
        // Nothing local survived the merge: the remote already holds this state.
        let remote_is_current = stats.local_only + stats.local_won == 0 && enriched == 0;
        let pushed = if remote_is_current {
            self.record_pushed(hash);
            false
        } else if has_changed(
            &hash,
            self.store.database().meta.backend_sync_info.last_pushed_hash.as_deref(),
        ) {
            match self
                .remote
                .upsert_project_items(&project.project_id, &project.project_name, &items)
                .await
            {
                Ok(()) => {
                    self.record_pushed(hash);
                    true
                }
                Err(e) if e.is_offline() => {
                    warn!(error = %e, "Push failed after merge; merged state kept locally");
                    return Ok(offline(&e));
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            false
        };

        self.store.database_mut().meta.backend_sync_info.last_synced_at = Some(now);
        let storage = self.persist().unwrap_or(storage);
        info!(
            project = %project.project_id,
            merged = stats.total(),
            pulled = stats.local_changes(),
            pushed,
            "Sync complete"
        );

        Ok(SyncOutcome::Synced(SyncReport {
            project_id: project.project_id,
            project_name: project.project_name,
            merge: stats,
            rejected,
            pushed,
            storage,
        }))
    }

    /// The project to sync with, honoring the sticky binding.
    async fn resolve_project(&self, choice: Option<BindingChoice>) -> Result<ProjectRef> {
        if let Some(binding) = self.binding() {
            return match choice {
                None => Ok(binding.project()),
                Some(BindingChoice::Existing(id)) if id == binding.project_id => {
                    Ok(binding.project())
                }
                Some(_) => Err(Error::AlreadyBound {
                    workspace: binding.workspace_path.clone(),
                    project_id: binding.project_id.clone(),
                }),
            };
        }

        match choice {
            Some(BindingChoice::Create(name)) => {
                if name.trim().is_empty() {
                    return Err(Error::Validation("project name must not be empty".into()));
                }
                Ok(ProjectRef::create(&name))
            }
            Some(BindingChoice::Existing(id)) => self
                .remote
                .list_projects()
                .await?
                .into_iter()
                .find(|p| p.project_id == id)
                .ok_or(Error::ProjectNotFound { id }),
            None => {
                let available = self
                    .remote
                    .list_projects()
                    .await?
                    .into_iter()
                    .map(|p| (p.project_id, p.project_name))
                    .collect();
                Err(Error::NotBound {
                    workspace: self.workspace_name.clone(),
                    available,
                })
            }
        }
    }
}

fn offline(error: &RemoteError) -> SyncOutcome {
    warn!(error = %error, "Remote unreachable; will retry on next sync");
    SyncOutcome::Offline {
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::Enrichment;
    use crate::model::Priority;
    use crate::scan::LineScanner;
    use chrono::{Duration, TimeZone};
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 10, 0, 0).unwrap()
    }

    #[derive(Default)]
    struct FakeRemote {
        projects: Mutex<Vec<ProjectRef>>,
        items: Mutex<BTreeMap<String, Vec<Value>>>,
        offline: AtomicBool,
        pushes: AtomicUsize,
    }

    impl FakeRemote {
        fn check(&self) -> std::result::Result<(), RemoteError> {
            if self.offline.load(Ordering::SeqCst) {
                Err(RemoteError::Offline("connection refused".into()))
            } else {
                Ok(())
            }
        }

        fn stored(&self, project_id: &str) -> Vec<Value> {
            self.items.lock().unwrap().get(project_id).cloned().unwrap_or_default()
        }
    }

    impl RemoteStore for Arc<FakeRemote> {
        async fn list_projects(&self) -> std::result::Result<Vec<ProjectRef>, RemoteError> {
            self.check()?;
            Ok(self.projects.lock().unwrap().clone())
        }

        async fn get_project_items(
            &self,
            project_id: &str,
        ) -> std::result::Result<Vec<Value>, RemoteError> {
            self.check()?;
            self.items
                .lock()
                .unwrap()
                .get(project_id)
                .cloned()
                .ok_or_else(|| RemoteError::NotFound(project_id.into()))
        }

        async fn upsert_project_items(
            &self,
            project_id: &str,
            project_name: &str,
            items: &[TrackedItem],
        ) -> std::result::Result<(), RemoteError> {
            self.check()?;
            self.pushes.fetch_add(1, Ordering::SeqCst);
            let mut projects = self.projects.lock().unwrap();
            if !projects.iter().any(|p| p.project_id == project_id) {
                projects.push(ProjectRef {
                    project_id: project_id.into(),
                    project_name: project_name.into(),
                });
            }
            let mut all = self.items.lock().unwrap();
            let stored = all.entry(project_id.to_string()).or_default();
            for item in items {
                let value = serde_json::to_value(item).unwrap();
                stored.retain(|v| v["id"] != value["id"]);
                stored.push(value);
            }
            Ok(())
        }
    }

    struct FixedEnricher;

    impl Enricher for FixedEnricher {
        async fn enrich(
            &self,
            _: &str,
            items: &[TrackedItem],
        ) -> std::result::Result<Vec<Enrichment>, RemoteError> {
            Ok(items
                .iter()
                .map(|i| {
                    let mut e = Enrichment::baseline(&i.id);
                    e.priority = Some(Priority::High);
                    e
                })
                .collect())
        }
    }

    struct Fixture {
        _home: TempDir,
        _ws: TempDir,
        home: PathBuf,
        ws: PathBuf,
        remote: Arc<FakeRemote>,
    }

    impl Fixture {
        fn new() -> Self {
            let home = TempDir::new().unwrap();
            let ws = TempDir::new().unwrap();
            Self {
                home: home.path().canonicalize().unwrap(),
                ws: ws.path().canonicalize().unwrap(),
                _home: home,
                _ws: ws,
                remote: Arc::new(FakeRemote::default()),
            }
        }

        fn open(&self) -> SyncCoordinator<Arc<FakeRemote>> {
            SyncCoordinator::open(&self.ws, "ws", &self.home, Arc::clone(&self.remote), None, t0())
                .unwrap()
        }

        fn write(&self, rel: &str, contents: &str) {
            let path = self.ws.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
    }

    #[test]
    fn test_gate_allows_one_holder() {
        let gate = SyncGate::new();
        let other = gate.clone();
        let guard = gate.try_enter().unwrap();
        assert!(other.try_enter().is_none());
        assert!(other.is_busy());
        drop(guard);
        assert!(other.try_enter().is_some());
    }

    #[tokio::test]
    async fn test_file_save_persists_without_binding() {
        let fx = Fixture::new();
        fx.write("src/a.rs", "// TODO: first\n");
        let mut coord = fx.open();

        let (stats, committed) = coord
            .on_file_saved(&LineScanner, &fx.ws.join("src/a.rs"), None, t0())
            .await
            .unwrap();
        assert_eq!(stats.inserted, 1);
        assert_eq!(committed.storage, StorageMode::Workspace);
        assert_eq!(committed.push, PushOutcome::NotBound);

        let reopened = fx.open();
        assert_eq!(reopened.store().len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_file_keeps_its_items() {
        let fx = Fixture::new();
        fx.write("src/a.rs", "// TODO: keep working\n");
        let mut coord = fx.open();
        coord
            .on_file_saved(&LineScanner, &fx.ws.join("src/a.rs"), None, t0())
            .await
            .unwrap();
        let id = coord.store().items().next().unwrap().id.clone();
        coord.set_status(&id, TodoStatus::InProgress, t0()).await.unwrap();

        let mut grown = "// TODO: keep working\n".to_string();
        grown.push_str(&"x".repeat(usize::try_from(crate::scan::MAX_FILE_BYTES).unwrap()));
        fx.write("src/a.rs", &grown);

        let later = t0() + Duration::minutes(1);
        let (stats, _) = coord
            .on_file_saved(&LineScanner, &fx.ws.join("src/a.rs"), None, later)
            .await
            .unwrap();
        assert_eq!(stats.auto_resolved, 0);
        assert_eq!(coord.store().get(&id).unwrap().status, TodoStatus::InProgress);

        let (stats, files, _) = coord.scan_workspace(&LineScanner, &[], later).await.unwrap();
        assert_eq!((stats.auto_resolved, files), (0, 0));
        assert_eq!(coord.store().get(&id).unwrap().status, TodoStatus::InProgress);

        fs::remove_file(fx.ws.join("src/a.rs")).unwrap();
        let (stats, _) = coord
            .on_file_saved(&LineScanner, &fx.ws.join("src/a.rs"), None, later)
            .await
            .unwrap();
        assert_eq!(stats.auto_resolved, 1);
    }

    #[tokio::test]
    async fn test_first_sync_requires_a_choice() {
        let fx = Fixture::new();
        fx.remote.projects.lock().unwrap().push(ProjectRef {
            project_id: "proj_a".into(),
            project_name: "Alpha".into(),
        });
        let mut coord = fx.open();

        let err = coord.sync(None, t0()).await.unwrap_err();
        match err {
            Error::NotBound { available, .. } => assert_eq!(available[0].0, "proj_a"),
            other => panic!("unexpected {other:?}"),
        }

        let err = coord
            .sync(Some(BindingChoice::Existing("missing".into())), t0())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProjectNotFound { .. }));
        assert!(coord.binding().is_none());
    }

    #[tokio::test]
    async fn test_create_binds_pushes_and_sticks() {
        let fx = Fixture::new();
        let mut coord = fx.open();
        coord.add_manual("write docs", "README.md", 1, t0()).await.unwrap();

        let outcome = coord
            .sync(Some(BindingChoice::Create("Docs".into())), t0())
            .await
            .unwrap();
        let SyncOutcome::Synced(report) = outcome else {
            panic!("expected synced, got {outcome:?}");
        };
        assert!(report.pushed);
        assert_eq!(report.merge.local_only, 1);
        assert_eq!(fx.remote.stored(&report.project_id).len(), 1);

        // Ids were re-derived under the bound project.
        let item = coord.store().items().next().unwrap();
        assert_eq!(item.id, crate::identity::stable_id(&report.project_id, "README.md", 1, "write docs"));

        // Sticky: no choice needed, conflicting choice refused.
        let again = coord.sync(None, t0()).await.unwrap();
        assert!(matches!(again, SyncOutcome::Synced(ref r) if !r.pushed));
        let err = coord
            .sync(Some(BindingChoice::Create("Other".into())), t0())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyBound { .. }));

        let reopened = fx.open();
        assert_eq!(reopened.binding().unwrap().project_id, report.project_id);
        assert!(reopened.store().database().meta.backend_sync_info.last_synced_at.is_some());
    }

    #[tokio::test]
    async fn test_offline_sync_leaves_local_state_untouched() {
        let fx = Fixture::new();
        let mut coord = fx.open();
        coord.add_manual("stay local", "a.rs", 1, t0()).await.unwrap();
        let before = coord.store().database().clone();

        fx.remote.offline.store(true, Ordering::SeqCst);
        let outcome = coord
            .sync(Some(BindingChoice::Create("X".into())), t0() + Duration::minutes(1))
            .await
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Offline { .. }));
        assert_eq!(coord.store().database(), &before);
        assert!(coord.binding().is_none());
    }

    #[tokio::test]
    async fn test_remote_changes_win_when_newer() {
        let fx = Fixture::new();
        fx.write("src/a.rs", "// TODO: shared\n");
        let mut coord = fx.open();
        coord
            .sync(Some(BindingChoice::Create("Shared".into())), t0())
            .await
            .unwrap();
        coord
            .on_file_saved(&LineScanner, &fx.ws.join("src/a.rs"), None, t0())
            .await
            .unwrap();
        let pid = coord.binding().unwrap().project_id.clone();
        let id = coord.store().items().next().unwrap().id.clone();

        // Another client resolves the item later.
        {
            let mut all = fx.remote.items.lock().unwrap();
            let stored = all.get_mut(&pid).unwrap();
            stored[0]["status"] = Value::from("resolved");
            stored[0]["updatedAt"] = Value::from("2025-07-02T00:00:00Z");
            stored.push(serde_json::json!({"id": "broken"}));
        }

        let outcome = coord.sync(None, t0() + Duration::hours(1)).await.unwrap();
        let SyncOutcome::Synced(report) = outcome else {
            panic!("expected synced");
        };
        assert_eq!(report.merge.remote_won, 1);
        assert_eq!(report.rejected.len(), 1);
        assert!(coord.store().get(&id).unwrap().is_resolved());
    }

    #[tokio::test]
    async fn test_push_is_skipped_when_unchanged() {
        let fx = Fixture::new();
        let mut coord = fx.open();
        coord
            .sync(Some(BindingChoice::Create("P".into())), t0())
            .await
            .unwrap();

        let (item, committed) = coord.add_manual("x", "a.rs", 1, t0()).await.unwrap();
        assert_eq!(committed.push, PushOutcome::Pushed);
        let pushes = fx.remote.pushes.load(Ordering::SeqCst);

        assert_eq!(coord.push_best_effort().await, PushOutcome::Unchanged);
        assert_eq!(fx.remote.pushes.load(Ordering::SeqCst), pushes);

        fx.remote.offline.store(true, Ordering::SeqCst);
        let (_, committed) = coord
            .mark_resolved(&item.id, t0() + Duration::minutes(5))
            .await
            .unwrap();
        assert!(matches!(committed.push, PushOutcome::Failed { .. }));
        assert!(coord.status().pending_push);
    }

    #[tokio::test]
    async fn test_sync_skipped_while_gate_is_held() {
        let fx = Fixture::new();
        let gate = SyncGate::new();
        let mut coord = fx.open().with_gate(gate.clone());
        let _held = gate.try_enter().unwrap();
        assert!(matches!(coord.sync(None, t0()).await.unwrap(), SyncOutcome::Skipped));
    }

    #[tokio::test]
    async fn test_offline_mode_never_calls_remote() {
        let fx = Fixture::new();
        let mut coord = fx.open().with_offline(true);
        let (_, committed) = coord.add_manual("x", "a.rs", 1, t0()).await.unwrap();
        assert_eq!(committed.push, PushOutcome::Disabled);
        assert!(matches!(
            coord.sync(Some(BindingChoice::Create("P".into())), t0()).await.unwrap(),
            SyncOutcome::Offline { .. }
        ));
        assert_eq!(fx.remote.pushes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_enrichment_fills_before_persist() {
        let fx = Fixture::new();
        let mut coord: SyncCoordinator<Arc<FakeRemote>, FixedEnricher> = SyncCoordinator::open(
            &fx.ws,
            "ws",
            &fx.home,
            Arc::clone(&fx.remote),
            Some(FixedEnricher),
            t0(),
        )
        .unwrap();
        let (item, committed) = coord.add_manual("rank me", "a.rs", 3, t0()).await.unwrap();
        assert_eq!(committed.enriched, 1);
        assert_eq!(item.priority, Some(Priority::High));
        assert_eq!(item.urgency_score, Some(0.3));
    }

    #[tokio::test]
    async fn test_scan_workspace_auto_resolves_removed() {
        let fx = Fixture::new();
        fx.write("a.rs", "// TODO: one\n// FIXME: two\n");
        let mut coord = fx.open();
        let (stats, files, _) = coord.scan_workspace(&LineScanner, &[], t0()).await.unwrap();
        assert_eq!((stats.inserted, files), (2, 1));

        fx.write("a.rs", "// TODO: one\n");
        let (stats, _, _) = coord
            .scan_workspace(&LineScanner, &[], t0() + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(stats.auto_resolved, 1);
        assert_eq!(coord.status().resolved, 1);
    }

    #[tokio::test]
    async fn test_clear_binding_allows_rebind() {
        let fx = Fixture::new();
        let mut coord = fx.open();
        coord
            .sync(Some(BindingChoice::Create("First".into())), t0())
            .await
            .unwrap();
        assert!(coord.clear_binding().unwrap().is_some());
        assert!(coord.binding().is_none());
        let outcome = coord
            .sync(Some(BindingChoice::Create("Second".into())), t0())
            .await
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Synced(ref r) if r.project_name == "Second"));
    }
}
