//! Input validation for item patches and remote payloads.
//!
//! Statuses and priorities accept their canonical spelling, a handful of
//! everyday synonyms (`done`, `wip`, `P1`, ...) and otherwise fail with the
//! nearest valid value as a suggestion.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};

// ── Canonical values ─────────────────────────────────────────

pub static VALID_STATUSES: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["open", "in_progress", "resolved"].into_iter().collect());

pub static VALID_PRIORITIES: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["low", "medium", "high", "urgent"].into_iter().collect());

// ── Synonym maps ─────────────────────────────────────────────

pub static STATUS_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("done", "resolved"),
        ("closed", "resolved"),
        ("complete", "resolved"),
        ("completed", "resolved"),
        ("fixed", "resolved"),
        ("wip", "in_progress"),
        ("working", "in_progress"),
        ("started", "in_progress"),
        ("in-progress", "in_progress"),
        ("inprogress", "in_progress"),
        ("todo", "open"),
        ("new", "open"),
        ("pending", "open"),
        ("reopen", "open"),
    ]
    .into_iter()
    .collect()
});

pub static PRIORITY_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("critical", "urgent"),
        ("crit", "urgent"),
        ("highest", "urgent"),
        ("p0", "urgent"),
        ("important", "high"),
        ("p1", "high"),
        ("normal", "medium"),
        ("default", "medium"),
        ("p2", "medium"),
        ("minor", "low"),
        ("trivial", "low"),
        ("lowest", "low"),
        ("p3", "low"),
    ]
    .into_iter()
    .collect()
});

/// Canonical status for `input`.
///
/// On failure the error carries the raw input and, when one is close
/// enough, the value the caller probably meant.
pub fn normalize_status(input: &str) -> Result<String, (String, Option<String>)> {
    normalize_in(input, &VALID_STATUSES, &STATUS_SYNONYMS)
}

/// Normalize a priority string via exact match, P-notation or synonym lookup.
pub fn normalize_priority(input: &str) -> Result<String, (String, Option<String>)> {
    normalize_in(input, &VALID_PRIORITIES, &PRIORITY_SYNONYMS)
}

fn normalize_in(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> Result<String, (String, Option<String>)> {
    let key = input.trim().to_lowercase();
    if valid.contains(key.as_str()) {
        return Ok(key);
    }
    match synonyms.get(key.as_str()) {
        Some(canonical) => Ok((*canonical).to_string()),
        None => Err((input.to_string(), closest_value(&key, valid, synonyms))),
    }
}

/// Validate a deadline string (RFC 3339 timestamp or `YYYY-MM-DD` date).
pub fn validate_deadline(input: &str) -> Result<String, String> {
    let trimmed = input.trim();
    if DateTime::parse_from_rfc3339(trimmed).is_ok()
        || NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok()
    {
        Ok(trimmed.to_string())
    } else {
        Err(format!("deadline '{input}' is not RFC 3339 or YYYY-MM-DD"))
    }
}

/// Validate an urgency score (finite, within `0.0..=1.0`).
pub fn validate_urgency(score: f64) -> Result<f64, String> {
    if score.is_finite() && (0.0..=1.0).contains(&score) {
        Ok(score)
    } else {
        Err(format!("urgency score {score} must be between 0 and 1"))
    }
}

/// Validate TODO text: must contain something other than whitespace.
pub fn validate_text(text: &str) -> Result<String, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err("text must be a non-empty string".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

/// Nearest canonical value within edit distance 3, looking through both the
/// valid set and the synonym keys. A synonym hit is reported as its target.
fn closest_value(
    key: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> Option<String> {
    valid
        .iter()
        .map(|v| (levenshtein_distance(key, v), *v))
        .chain(
            synonyms
                .iter()
                .map(|(alias, target)| (levenshtein_distance(key, alias), *target)),
        )
        .filter(|(dist, _)| *dist <= 3)
        .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)))
        .map(|(_, value)| value.to_string())
}

/// Edit distance (insertions, deletions, substitutions) between two strings,
/// counted in chars.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let target: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=target.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in target.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == *cb {
                diagonal
            } else {
                1 + diagonal.min(above).min(row[j])
            };
            diagonal = above;
        }
    }

    row[target.len()]
}

/// Find existing ids that the searched id was probably meant to be.
///
/// Ids are 64-char digests, so users usually type a prefix. Prefix matches
/// come first; otherwise ids whose leading characters are within edit
/// distance 2 of the input. Returns at most `max` suggestions.
#[must_use]
pub fn find_similar_ids(searched: &str, existing: &[String], max: usize) -> Vec<String> {
    let searched = searched.to_lowercase();
    let prefix_matches: Vec<String> = existing
        .iter()
        .filter(|id| id.starts_with(&searched))
        .take(max)
        .cloned()
        .collect();
    if !prefix_matches.is_empty() {
        return prefix_matches;
    }

    let width = searched.chars().count();
    let mut candidates: Vec<(usize, &str)> = existing
        .iter()
        .map(|id| {
            let head: String = id.chars().take(width).collect();
            (levenshtein_distance(&searched, &head), id.as_str())
        })
        .filter(|(dist, _)| *dist <= 2)
        .collect();

    candidates.sort_unstable();
    candidates.into_iter().take(max).map(|(_, id)| id.to_owned()).collect()
}
