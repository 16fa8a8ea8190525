//! Error types for the Busy Bee TODO tracker.
//!
//! Every [`Error`] maps to an [`ErrorCode`], which fixes the process exit
//! code (2 storage, 3 not found, 4 validation, 5 binding, 6 remote, 7 config,
//! 8 I/O) and whether a script should try again. Scripts get the error as
//! JSON on stderr; people get the message plus a hint.
//!
//! Storage and network failures have their own enums
//! ([`StorageError`], [`RemoteError`]) because most of them are recovered
//! locally (backend fallback, offline sync) and never reach this type.

use thiserror::Error;

use crate::storage::StorageError;
use crate::sync::RemoteError;

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Codes ────────────────────────────────────────────────────

/// Stable error identifiers, grouped by exit-code category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Storage (exit 2)
    BackendUnavailable,
    CorruptData,

    // Not Found (exit 3)
    ItemNotFound,
    ProjectNotFound,
    NotBound,

    // Validation (exit 4)
    ValidationError,
    InvalidArgument,

    // Binding (exit 5)
    BindingConflict,

    // Sync (exit 6)
    NetworkUnavailable,
    RemoteError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Code as printed in JSON output.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::BackendUnavailable => "BACKEND_UNAVAILABLE",
            Self::CorruptData => "CORRUPT_DATA",
            Self::ItemNotFound => "ITEM_NOT_FOUND",
            Self::ProjectNotFound => "PROJECT_NOT_FOUND",
            Self::NotBound => "NOT_BOUND",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::BindingConflict => "BINDING_CONFLICT",
            Self::NetworkUnavailable => "NETWORK_UNAVAILABLE",
            Self::RemoteError => "REMOTE_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::BackendUnavailable | Self::CorruptData => 2,
            Self::ItemNotFound | Self::ProjectNotFound | Self::NotBound => 3,
            Self::ValidationError | Self::InvalidArgument => 4,
            Self::BindingConflict => 5,
            Self::NetworkUnavailable | Self::RemoteError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether a caller should retry, either with corrected input or later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ValidationError
                | Self::InvalidArgument
                | Self::NetworkUnavailable
                | Self::BackendUnavailable
        )
    }
}

// ── Errors ───────────────────────────────────────────────────

/// Errors that can surface from tracker operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Item not found: {id}")]
    ItemNotFound { id: String },

    #[error("Item not found: {id} (did you mean: {}?)", similar.join(", "))]
    ItemNotFoundSimilar { id: String, similar: Vec<String> },

    #[error("Remote project not found: {id}")]
    ProjectNotFound { id: String },

    #[error("Workspace is not bound to a remote project: {workspace}")]
    NotBound {
        workspace: String,
        /// (project_id, project_name) of remote projects for hint display.
        available: Vec<(String, String)>,
    },

    #[error("Workspace {workspace} is already bound to project {project_id}")]
    AlreadyBound {
        workspace: String,
        project_id: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ItemNotFound { .. } | Self::ItemNotFoundSimilar { .. } => ErrorCode::ItemNotFound,
            Self::ProjectNotFound { .. } => ErrorCode::ProjectNotFound,
            Self::NotBound { .. } => ErrorCode::NotBound,
            Self::AlreadyBound { .. } => ErrorCode::BindingConflict,
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Storage(StorageError::CorruptData { .. }) => ErrorCode::CorruptData,
            Self::Storage(_) => ErrorCode::BackendUnavailable,
            Self::Remote(RemoteError::Offline(_)) => ErrorCode::NetworkUnavailable,
            Self::Remote(RemoteError::NotFound(_)) => ErrorCode::ProjectNotFound,
            Self::Remote(_) => ErrorCode::RemoteError,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// What the operator can do about it, if anything.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::ItemNotFound { id } => Some(format!(
                "No item with ID '{id}'. Use `bbt list` to see tracked items."
            )),
            Self::ItemNotFoundSimilar { similar, .. } => {
                Some(format!("Did you mean: {}?", similar.join(", ")))
            }

            Self::ProjectNotFound { id } => Some(format!(
                "No remote project with ID '{id}'. Use `bbt projects` to list remote projects."
            )),

            Self::NotBound { workspace, available } => {
                let mut hint = format!("'{workspace}' has no remote project yet.\n");
                if available.is_empty() {
                    hint.push_str("  No remote projects exist yet.\n");
                } else {
                    hint.push_str("  Remote projects:\n");
                    for (id, name) in available.iter().take(5) {
                        hint.push_str(&format!("    {id}  \"{name}\"\n"));
                    }
                    if available.len() > 5 {
                        hint.push_str(&format!("    ... and {} more\n", available.len() - 5));
                    }
                    hint.push_str("  Select one: bbt sync --project <project-id>\n");
                }
                hint.push_str("  Create one: bbt sync --create \"project name\"");
                Some(hint)
            }

            Self::AlreadyBound { .. } => Some(
                "Bindings are sticky. Run `bbt binding clear` first to rebind this workspace."
                    .to_string(),
            ),

            Self::Validation(msg) | Self::InvalidArgument(msg) => {
                if msg.contains("status") {
                    Some(
                        "Valid statuses: open, in_progress, resolved. \
                         Synonyms: done→resolved, wip→in_progress, todo→open"
                            .to_string(),
                    )
                } else if msg.contains("priority") {
                    Some("Valid priorities: low, medium, high, urgent (or P0-P3)".to_string())
                } else if msg.contains("deadline") {
                    Some("Deadlines use RFC 3339 or YYYY-MM-DD".to_string())
                } else {
                    None
                }
            }

            Self::Remote(RemoteError::Offline(_)) => Some(
                "The backend is unreachable. Local state is saved; run `bbt sync` again later."
                    .to_string(),
            ),

            Self::Storage(_) | Self::Remote(_) | Self::Io(_) | Self::Json(_) | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// `{"error": {code, message, retryable, exit_code, hint?}}`
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(Error::ItemNotFound { id: "x".into() }.exit_code(), 3);
        assert_eq!(Error::Validation("bad".into()).exit_code(), 4);
        assert_eq!(Error::Remote(RemoteError::Offline("down".into())).exit_code(), 6);
        assert_eq!(Error::Config("x".into()).exit_code(), 7);
    }

    #[test]
    fn test_not_bound_hint_lists_projects() {
        let err = Error::NotBound {
            workspace: "/tmp/ws".into(),
            available: vec![("p1".into(), "Alpha".into())],
        };
        let hint = err.hint().unwrap();
        assert!(hint.contains("p1"));
        assert!(hint.contains("--create"));
    }

    #[test]
    fn test_structured_json_shape() {
        let err = Error::Validation("unknown status 'zzz'".into());
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["retryable"], true);
        assert!(json["error"]["hint"].as_str().unwrap().contains("in_progress"));
    }
}
