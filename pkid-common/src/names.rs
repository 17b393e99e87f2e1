//! Name normalization
//!
//! Operator-supplied names are compared against member display names only
//! after both sides pass through [`normalize`]: trimmed, every whitespace
//! run collapsed to a single space, uppercased.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of names accepted in one batch
pub const MAX_BATCH_SIZE: usize = 50;

/// Canonicalize a free-text name for comparison
///
/// Empty or whitespace-only input yields an empty string; callers drop those
/// before forming a batch.
///
/// # Examples
///
/// ```
/// use pkid_common::names::normalize;
///
/// assert_eq!(normalize("  hsiuting \t chou "), "HSIUTING CHOU");
/// assert_eq!(normalize("   "), "");
/// ```
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// A normalized, non-empty name
///
/// Only constructible through normalization, so every value is trimmed,
/// whitespace-collapsed and uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InputName(String);

impl InputName {
    /// Normalize `raw`, returning `None` when nothing is left
    pub fn new(raw: &str) -> Option<Self> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substring test in either direction (CONTAINS matching)
    pub fn overlaps(&self, other: &str) -> bool {
        other.contains(self.0.as_str()) || self.0.contains(other)
    }
}

impl fmt::Display for InputName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InputName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InputName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        InputName::new(&value).ok_or_else(|| "name is empty after normalization".to_string())
    }
}

impl From<InputName> for String {
    fn from(name: InputName) -> Self {
        name.0
    }
}

/// Split multi-line operator input into a batch of names
///
/// One name per line. Lines are normalized, blank lines dropped, and the
/// result truncated to `max_count` entries in input order.
///
/// # Examples
///
/// ```
/// use pkid_common::names::split_batch;
///
/// let batch = split_batch("alice smith\n\n  bob   lee\r\n", 50);
/// let names: Vec<&str> = batch.iter().map(|n| n.as_str()).collect();
/// assert_eq!(names, ["ALICE SMITH", "BOB LEE"]);
/// ```
pub fn split_batch(raw_text: &str, max_count: usize) -> Vec<InputName> {
    raw_text
        .lines()
        .filter_map(InputName::new)
        .take(max_count)
        .collect()
}

/// Remove repeated names, keeping the first occurrence of each
pub fn dedup_preserving_order(names: &[InputName]) -> Vec<InputName> {
    let mut seen = std::collections::HashSet::with_capacity(names.len());
    names
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}
