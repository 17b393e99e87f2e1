//! Data model for a lookup batch

use pkid_common::names::normalize;
use pkid_common::{Error, InputName, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Match Mode
// ============================================================================

/// How input names are compared with member display names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Equality after normalization (`eq` filter)
    #[default]
    Exact,
    /// Substring in either direction (`like` filter)
    Contains,
}

impl FromStr for MatchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" | "eq" => Ok(MatchMode::Exact),
            "contains" | "like" => Ok(MatchMode::Contains),
            other => Err(Error::InvalidInput(format!(
                "Unknown match mode '{}' (expected 'exact' or 'contains')",
                other
            ))),
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Exact => f.write_str("exact"),
            MatchMode::Contains => f.write_str("contains"),
        }
    }
}

// ============================================================================
// Member Record
// ============================================================================

/// A member as returned by the list endpoint
///
/// Read-only copy; only the fields needed for matching are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// PassKit internal member id (may be empty in malformed responses)
    pub member_id: String,
    /// `person.displayName` as returned (not normalized)
    pub display_name: String,
    pub salutation: Option<String>,
}

const PERSON_KEYS: [&str; 2] = ["person", "Person"];
const DISPLAY_NAME_KEYS: [&str; 3] = ["displayName", "display_name", "name"];
const ID_KEYS: [&str; 3] = ["id", "memberId", "member_id"];

impl MemberRecord {
    pub fn new(member_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            member_id: member_id.into(),
            display_name: display_name.into(),
            salutation: None,
        }
    }

    /// Lift a raw JSON member object, tolerating key casing variants
    ///
    /// Display name comes from `person.displayName` (or `display_name` /
    /// `name`, under `person` or `Person`). The id comes from `id`,
    /// `memberId` or `member_id`, as a string or a number. Anything missing
    /// becomes an empty string.
    pub fn from_value(value: &Value) -> Self {
        let person = PERSON_KEYS
            .iter()
            .find_map(|key| value.get(*key).filter(|v| v.is_object()));

        let display_name = person
            .and_then(|p| first_string(p, &DISPLAY_NAME_KEYS))
            .unwrap_or_default();

        let salutation = person
            .and_then(|p| first_string(p, &["salutation"]))
            .filter(|s| !s.is_empty());

        let member_id = first_string(value, &ID_KEYS).unwrap_or_default();

        Self {
            member_id,
            display_name,
            salutation,
        }
    }
}

/// First key holding a non-empty string (or number) value
fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

// ============================================================================
// Results
// ============================================================================

/// One resolved association between an input name and a member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub search_name: InputName,
    /// Normalized member display name
    pub member_name: String,
    pub member_id: String,
}

impl MatchResult {
    pub fn new(
        search_name: InputName,
        member_name: impl Into<String>,
        member_id: impl Into<String>,
    ) -> Self {
        Self {
            search_name,
            member_name: normalize(&member_name.into()),
            member_id: member_id.into(),
        }
    }
}

/// Found / not-found partition of one batch
///
/// Every input name appears either as the `search_name` of at least one
/// entry in `found` or in `not_found`, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub found: Vec<MatchResult>,
    pub not_found: Vec<InputName>,
}

impl BatchOutcome {
    pub fn hit_count(&self) -> usize {
        self.found.len()
    }

    /// Distinct input names with at least one match, in first-hit order
    pub fn found_names(&self) -> Vec<&InputName> {
        let mut seen = HashSet::new();
        self.found
            .iter()
            .map(|r| &r.search_name)
            .filter(|name| seen.insert(name.as_str()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty() && self.not_found.is_empty()
    }
}
