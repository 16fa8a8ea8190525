//! Stable item identity.
//!
//! An item's id is derived from its logical coordinates so that re-scanning
//! an unchanged file yields the same ids. Moving a TODO to another line or
//! rewording it produces a different id, which the store treats as a new
//! item.

use sha2::{Digest, Sha256};

/// Normalize TODO text for hashing: trim, lowercase, collapse whitespace runs.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalize a workspace-relative path to forward slashes.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Derive the stable id of a tracked item.
///
/// The digest covers `project_id|file_path|line|normalize_text(text)`.
#[must_use]
pub fn stable_id(project_id: &str, file_path: &str, line: u32, text: &str) -> String {
    let core = format!(
        "{project_id}|{}|{line}|{}",
        normalize_path(file_path),
        normalize_text(text)
    );
    let mut hasher = Sha256::new();
    hasher.update(core.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Fix   the\tBUG \n"), "fix the bug");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_stable_id_deterministic() {
        let a = stable_id("proj", "src/main.rs", 10, "TODO: fix bug");
        let b = stable_id("proj", "src/main.rs", 10, "TODO: fix bug");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_stable_id_ignores_case_and_spacing() {
        let a = stable_id("proj", "src/main.rs", 10, "fix  the bug");
        let b = stable_id("proj", "src/main.rs", 10, "  Fix the BUG");
        assert_eq!(a, b);
    }

    #[test]
    fn test_stable_id_changes_with_each_coordinate() {
        let base = stable_id("proj", "src/main.rs", 10, "fix bug");
        assert_ne!(base, stable_id("other", "src/main.rs", 10, "fix bug"));
        assert_ne!(base, stable_id("proj", "src/lib.rs", 10, "fix bug"));
        assert_ne!(base, stable_id("proj", "src/main.rs", 11, "fix bug"));
        assert_ne!(base, stable_id("proj", "src/main.rs", 10, "fix bug urgently"));
    }

    #[test]
    fn test_stable_id_path_separators() {
        let unix = stable_id("proj", "src/a/b.rs", 1, "x");
        let windows = stable_id("proj", "src\\a\\b.rs", 1, "x");
        assert_eq!(unix, windows);
    }
}
