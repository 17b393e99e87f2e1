//! Operator session state
//!
//! One [`Session`] lives for as long as the operator keeps the front end
//! open. It is passed by reference to whatever drives the lookups; nothing
//! here is global.

use crate::models::{BatchOutcome, MatchMode, MatchResult};
use std::collections::HashSet;

/// Member ids the operator has flagged as copied
///
/// Marks persist across searches; only [`CopyStateTracker::clear`] removes
/// them.
#[derive(Debug, Clone, Default)]
pub struct CopyStateTracker {
    marked: HashSet<String>,
}

impl CopyStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag `member_id` as copied; returns `false` if it already was
    pub fn mark(&mut self, member_id: &str) -> bool {
        self.marked.insert(member_id.to_string())
    }

    pub fn is_marked(&self, member_id: &str) -> bool {
        self.marked.contains(member_id)
    }

    pub fn clear(&mut self) {
        self.marked.clear();
    }

    pub fn len(&self) -> usize {
        self.marked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }
}

/// Session-scoped store for the interactive front end
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub copies: CopyStateTracker,
    /// Raw name input, kept so a re-run starts from the previous text
    pub names_text: String,
    pub mode: MatchMode,
    last_outcome: Option<BatchOutcome>,
}

impl Session {
    pub fn new(mode: MatchMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Append one line of name input
    pub fn add_name(&mut self, raw: &str) {
        if !self.names_text.is_empty() && !self.names_text.ends_with('\n') {
            self.names_text.push('\n');
        }
        self.names_text.push_str(raw.trim());
        self.names_text.push('\n');
    }

    pub fn reset_names(&mut self) {
        self.names_text.clear();
    }

    /// Replace the last outcome; copy marks are left alone
    pub fn record_outcome(&mut self, outcome: BatchOutcome) {
        self.last_outcome = Some(outcome);
    }

    pub fn last_outcome(&self) -> Option<&BatchOutcome> {
        self.last_outcome.as_ref()
    }

    /// Results of the last search, empty before the first one
    pub fn last_found(&self) -> &[MatchResult] {
        self.last_outcome
            .as_ref()
            .map(|o| o.found.as_slice())
            .unwrap_or(&[])
    }

    /// Mark a row of the last outcome by 1-based row number
    ///
    /// Returns the member id, or `None` if there is no such row.
    pub fn mark_row(&mut self, row: usize) -> Option<String> {
        let member_id = self
            .last_found()
            .get(row.checked_sub(1)?)?
            .member_id
            .clone();
        self.copies.mark(&member_id);
        Some(member_id)
    }

    /// Mark by row number when `target` is numeric and in range, otherwise
    /// treat it as a member id
    pub fn mark(&mut self, target: &str) -> Option<String> {
        let target = target.trim();
        if target.is_empty() {
            return None;
        }
        if let Ok(row) = target.parse::<usize>() {
            if let Some(id) = self.mark_row(row) {
                return Some(id);
            }
        }
        self.copies.mark(target);
        Some(target.to_string())
    }
}
