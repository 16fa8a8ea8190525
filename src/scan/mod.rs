//! TODO extraction from source files.
//!
//! The [`Scanner`] trait turns one file's contents into tracked items. The
//! default [`LineScanner`] looks for `TODO`, `FIXME` and `BUG` markers, one
//! item per line at most. Workspace scans walk the tree with `walkdir`,
//! skipping build output and VCS folders, and yield to the runtime every
//! [`SCAN_CHUNK`] files.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
use crate::identity::normalize_path;
use crate::model::TrackedItem;
use crate::storage::workspace::WORKSPACE_DIR;

/// Files processed between cooperative yields during a workspace scan.
pub const SCAN_CHUNK: usize = 64;

/// Folder names never descended into.
pub const DEFAULT_EXCLUDE: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    "out",
    ".git",
    ".vscode",
    WORKSPACE_DIR,
];

/// Files larger than this are not scanned.
pub const MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Extracts tracked items from file contents.
///
/// Implementations must be deterministic: the same input yields the same
/// items, which is what keeps ids stable across re-scans.
pub trait Scanner: Send + Sync {
    fn scan(
        &self,
        contents: &str,
        project_id: &str,
        file_path: &str,
        now: DateTime<Utc>,
    ) -> Vec<TrackedItem>;
}

/// Marker-based scanner.
///
/// Markers are tried in order per line; the first that matches wins. A
/// marker must start a word and be followed by `:`, `-` or whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineScanner;

fn markers() -> &'static [Regex; 3] {
    static MARKERS: OnceLock<[Regex; 3]> = OnceLock::new();
    MARKERS.get_or_init(|| {
        [
            Regex::new(r"(?i)\bTODO[:\s-]+(.+)").expect("valid TODO regex"),
            Regex::new(r"(?i)\bFIXME[:\s-]+(.+)").expect("valid FIXME regex"),
            Regex::new(r"(?i)\bBUG[:\s-]+(.+)").expect("valid BUG regex"),
        ]
    })
}

/// Text of the first marker on `line`, if any.
fn marker_text(line: &str) -> Option<&str> {
    markers().iter().find_map(|re| {
        re.captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .filter(|t| !t.is_empty())
    })
}

impl Scanner for LineScanner {
    fn scan(
        &self,
        contents: &str,
        project_id: &str,
        file_path: &str,
        now: DateTime<Utc>,
    ) -> Vec<TrackedItem> {
        contents
            .lines()
            .zip(1u32..)
            .filter_map(|(line, number)| {
                marker_text(line)
                    .map(|text| TrackedItem::scanned(project_id, file_path, number, text, now))
            })
            .collect()
    }
}

/// Path of `path` relative to `root`, with forward slashes.
///
/// # Errors
///
/// Returns `InvalidArgument` if `path` is not inside `root`.
pub fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    let absolute = absolute.canonicalize().unwrap_or(absolute);
    absolute
        .strip_prefix(root)
        .map(|rel| normalize_path(&rel.to_string_lossy()))
        .map_err(|_| {
            Error::InvalidArgument(format!(
                "'{}' is outside the workspace {}",
                path.display(),
                root.display()
            ))
        })
}

/// What [`read_source`] found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Text(String),
    /// The file does not exist; its scan items no longer have a home.
    Missing,
    /// Binary, oversized or unreadable. Recorded items are left as they are.
    Skipped,
}

/// Read a file for scanning.
#[must_use]
pub fn read_source(path: &Path) -> Source {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Source::Missing,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Cannot stat file");
            return Source::Skipped;
        }
    };
    if meta.len() > MAX_FILE_BYTES {
        trace!(path = %path.display(), "Skipping oversized file");
        return Source::Skipped;
    }
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Source::Missing,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Cannot read file");
            return Source::Skipped;
        }
    };
    if bytes.contains(&0) {
        return Source::Skipped;
    }
    String::from_utf8(bytes).map_or(Source::Skipped, Source::Text)
}

fn is_excluded(entry: &DirEntry, exclude: &[String]) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_str().is_some_and(|name| {
            DEFAULT_EXCLUDE.contains(&name) || exclude.iter().any(|e| e == name)
        })
}

/// All candidate files under `root`, in a stable order.
#[must_use]
pub fn workspace_files(root: &Path, exclude: &[String]) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded(e, exclude))
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
        .collect()
}

/// Result of [`scan_workspace`].
#[derive(Debug, Default)]
pub struct WorkspaceScan {
    pub items: Vec<TrackedItem>,
    /// Files read and scanned.
    pub files: usize,
    /// Files present but not read; their recorded items must not be touched.
    pub skipped: BTreeSet<String>,
}

/// Scan every file of a workspace.
pub async fn scan_workspace<S: Scanner>(
    scanner: &S,
    root: &Path,
    exclude: &[String],
    project_id: &str,
    now: DateTime<Utc>,
) -> WorkspaceScan {
    let files = workspace_files(root, exclude);
    let mut scan = WorkspaceScan::default();

    for chunk in files.chunks(SCAN_CHUNK) {
        for path in chunk {
            let Ok(rel) = relative_path(root, path) else {
                continue;
            };
            match read_source(path) {
                Source::Text(contents) => {
                    scan.items.extend(scanner.scan(&contents, project_id, &rel, now));
                    scan.files += 1;
                }
                Source::Skipped => {
                    scan.skipped.insert(rel);
                }
                Source::Missing => {}
            }
        }
        tokio::task::yield_now().await;
    }

    debug!(
        root = %root.display(),
        files = scan.files,
        skipped = scan.skipped.len(),
        items = scan.items.len(),
        "Scanned workspace"
    );
    scan
}
