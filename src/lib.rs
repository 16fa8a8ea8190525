//! Busy Bee TODO tracker - offline-first TODO store with remote sync
//!
//! This crate provides the persistence and synchronization engine behind the
//! `bbt` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (TrackedItem, ProjectDatabase, bindings)
//! - [`identity`] - Stable item ids
//! - [`store`] - In-memory working set and override rules
//! - [`storage`] - Atomic, dual-backend JSON persistence with migrations
//! - [`sync`] - Remote client, LWW merge and the sync coordinator
//! - [`scan`] - TODO marker extraction
//! - [`enrich`] - Optional enrichment client
//! - [`reminder`] - Per-file reminder scheduling
//! - [`config`] - Configuration and workspace bindings
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod enrich;
pub mod error;
pub mod identity;
pub mod model;
pub mod reminder;
pub mod scan;
pub mod storage;
pub mod store;
pub mod sync;
pub mod validate;

pub use error::{Error, Result};
