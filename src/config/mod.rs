//! Configuration management.
//!
//! This module discovers the Busy Bee directories, loads the optional
//! `config.json`, and resolves the effective settings for a command.
//!
//! # Layout
//!
//! - **Global directory**: `~/.busybee/` (or `$BBT_HOME`) holds `config.json`,
//!   `bindings.json` and the global storage fallback under `projects/`.
//! - **Workspace directory**: `<workspace>/.busybee/` holds the primary copy
//!   of the project database.

mod bindings;

pub use bindings::{BindingRegistry, BINDINGS_FILE};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::atomic_write;

/// Backend used when nothing else is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5050";

/// Per-request timeout for remote calls.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// File name of the user configuration under the global directory.
pub const CONFIG_FILE: &str = "config.json";

/// Persisted user configuration. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrich_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// Extra folder names skipped by workspace scans.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

/// Get the global Busy Bee directory.
///
/// Priority:
/// 1. `BBT_HOME` environment variable
/// 2. `~/.busybee/`
#[must_use]
pub fn global_dir() -> Option<PathBuf> {
    if let Some(home) = env_value("BBT_HOME") {
        return Some(PathBuf::from(home));
    }
    directories::BaseDirs::new().map(|b| b.home_dir().join(".busybee"))
}

/// Load `config.json` from `global_dir`. A missing file is the default config.
///
/// # Errors
///
/// Returns `Config` if the file exists but cannot be read or parsed.
pub fn load_config(global_dir: &Path) -> Result<Config> {
    let path = global_dir.join(CONFIG_FILE);
    match fs::read_to_string(&path) {
        Ok(content) => serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(Error::Config(format!("Failed to read {}: {e}", path.display()))),
    }
}

/// Write `config.json` atomically.
///
/// # Errors
///
/// Returns `Config` if serialization or the write fails.
pub fn save_config(global_dir: &Path, config: &Config) -> Result<()> {
    let path = global_dir.join(CONFIG_FILE);
    let json = serde_json::to_vec_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;
    atomic_write(&path, &json)
        .map_err(|e| Error::Config(format!("Failed to write {}: {e}", path.display())))
}

/// Resolve the backend base URL.
///
/// Priority:
/// 1. `--backend-url` flag
/// 2. `BUSYBEE_BACKEND_URL` environment variable
/// 3. `backendUrl` in `config.json`
/// 4. [`DEFAULT_BACKEND_URL`]
#[must_use]
pub fn resolve_backend_url(explicit: Option<&str>, config: &Config) -> String {
    pick_backend_url(explicit, env_value("BUSYBEE_BACKEND_URL").as_deref(), config)
}

fn pick_backend_url(explicit: Option<&str>, env: Option<&str>, config: &Config) -> String {
    explicit
        .or(env)
        .or(config.backend_url.as_deref())
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .unwrap_or(DEFAULT_BACKEND_URL)
        .trim_end_matches('/')
        .to_string()
}

/// Whether enrichment runs after sync.
///
/// `BUSYBEE_ENRICH` overrides `enrichEnabled`; both default to off.
#[must_use]
pub fn resolve_enrich(config: &Config) -> bool {
    env_value("BUSYBEE_ENRICH").map_or(config.enrich_enabled.unwrap_or(false), |v| is_truthy(&v))
}

/// Parse an on/off environment value.
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
        && !value.eq_ignore_ascii_case("off")
}

/// Resolve the workspace root.
///
/// Priority:
/// 1. `--workspace` flag (clap also reads `BBT_WORKSPACE` into it)
/// 2. Current directory
///
/// # Errors
///
/// Returns `InvalidArgument` if the path does not exist or is not a directory.
pub fn resolve_workspace(explicit: Option<&Path>) -> Result<PathBuf> {
    let raw = match explicit {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()?,
    };
    let root = raw.canonicalize().map_err(|e| {
        Error::InvalidArgument(format!("workspace '{}' is not accessible: {e}", raw.display()))
    })?;
    if !root.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "workspace '{}' is not a directory",
            root.display()
        )));
    }
    Ok(root)
}

/// Display name of a workspace: its directory name.
#[must_use]
pub fn workspace_name(root: &Path) -> String {
    root.file_name()
        .map_or_else(|| root.to_string_lossy().to_string(), |n| n.to_string_lossy().to_string())
}

/// Everything a command needs to know about where and how to run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub workspace: PathBuf,
    pub workspace_name: String,
    pub global_dir: PathBuf,
    pub backend_url: String,
    pub enrich: bool,
    pub timeout: Duration,
    /// Never contact the remote.
    pub offline: bool,
    pub exclude: Vec<String>,
}

impl Settings {
    /// Resolve settings from CLI flags, environment and `config.json`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if no global directory can be determined or the
    /// config file is unreadable, and `InvalidArgument` for a bad workspace.
    pub fn resolve(
        workspace: Option<&Path>,
        backend_url: Option<&str>,
        offline: bool,
    ) -> Result<Self> {
        let global_dir = global_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
        let config = load_config(&global_dir)?;
        let workspace = resolve_workspace(workspace)?;

        let settings = Self {
            workspace_name: workspace_name(&workspace),
            workspace,
            backend_url: resolve_backend_url(backend_url, &config),
            enrich: resolve_enrich(&config),
            timeout: Duration::from_secs(
                config.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS).max(1),
            ),
            offline,
            exclude: config.exclude,
            global_dir,
        };
        debug!(
            workspace = %settings.workspace.display(),
            global = %settings.global_dir.display(),
            backend = %settings.backend_url,
            offline,
            "Resolved settings"
        );
        Ok(settings)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
