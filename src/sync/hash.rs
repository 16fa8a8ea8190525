//! Content hashing for push deduplication.
//!
//! The payload pushed to the remote is fingerprinted with SHA-256 over its
//! JSON serialization. When the fingerprint matches the last payload the
//! remote accepted, the push is skipped.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Compute a SHA-256 hash of a serializable value.
///
/// Item lists are kept in id order and maps serialize with sorted keys, so
/// equal content always yields an equal hash.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized to JSON.
pub fn content_hash<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let json = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check if content has changed since it was last pushed.
///
/// Returns `true` if there is no stored hash or it differs.
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackedItem;
    use chrono::{TimeZone, Utc};

    fn sample(text: &str) -> Vec<TrackedItem> {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        vec![TrackedItem::scanned("p", "a.rs", 1, text, now)]
    }

    #[test]
    fn test_same_payload_same_hash() {
        let first = content_hash(&sample("TODO: a")).unwrap();
        assert_eq!(first, content_hash(&sample("TODO: a")).unwrap());
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_status_change_changes_hash() {
        let open = sample("TODO: a");
        let mut resolved = open.clone();
        resolved[0].status = crate::model::TodoStatus::Resolved;
        assert_ne!(content_hash(&open).unwrap(), content_hash(&resolved).unwrap());
    }

    #[test]
    fn test_push_needed_without_or_with_stale_hash() {
        let hash = content_hash(&sample("TODO: a")).unwrap();
        assert!(has_changed(&hash, None));
        assert!(has_changed(&hash, Some("0000")));
        assert!(!has_changed(&hash, Some(hash.as_str())));
    }
}
