//! Synchronization with the remote canonical store.
//!
//! The local database is authoritative while offline. Sync pulls the remote
//! copy of the bound project, merges it last-writer-wins by item id, persists
//! the result and pushes it back.
//!
//! # Submodules
//!
//! - [`remote`] - `RemoteStore` trait and its HTTP implementation
//! - [`types`] - Wire DTOs, validation and outcomes
//! - [`merge`] - The LWW merge engine
//! - [`hash`] - Content hashing for push deduplication
//! - [`coordinator`] - Mutate → persist → push orchestration

pub mod coordinator;
pub mod hash;
pub mod merge;
pub mod remote;
pub mod types;

pub use coordinator::{
    BindingChoice, Committed, StatusReport, SyncCoordinator, SyncGate, SyncGuard,
};
pub use hash::{content_hash, has_changed};
pub use merge::{merge, MergeOutcome, MergeStats};
pub use remote::{HttpRemoteStore, RemoteStore};
pub use types::{validate_remote_items, PushOutcome, RemoteError, SyncOutcome, SyncReport};
