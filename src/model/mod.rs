//! Data models for the TODO tracker.
//!
//! This module contains all domain models:
//! - TrackedItem (one TODO and its enrichment)
//! - ProjectDatabase (the persisted per-project document)
//! - ProjectRef / WorkspaceBinding (remote project identity)

pub mod database;
pub mod item;
pub mod project;

pub use database::{BackendSyncInfo, DbMeta, ProjectDatabase, CURRENT_SCHEMA_VERSION};
pub use item::{ItemSource, Priority, SuggestedFile, TodoStatus, TrackedItem};
pub use project::{derive_project_id, ProjectRef, WorkspaceBinding};
