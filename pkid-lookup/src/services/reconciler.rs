//! Result reconciliation
//!
//! Attributes member records returned by the API back to the input names
//! that asked for them.
//!
//! # Matching policy
//!
//! - **Exact**: a record belongs to the input name equal to its normalized
//!   display name.
//! - **Contains**: a record belongs to the *first* input name, in batch
//!   order, that is a substring of the display name or has it as a
//!   substring. First match wins, so a broad record is never fanned out to
//!   every loosely matching name; a later, more specific name can lose it.
//!
//! Either way one record yields at most one [`MatchResult`], while one input
//! name may collect several.

use crate::models::{BatchOutcome, MatchMode, MatchResult, MemberRecord};
use pkid_common::names::dedup_preserving_order;
use pkid_common::InputName;
use std::collections::HashSet;
use tracing::debug;

/// Normalized display name and id of a usable record
///
/// Records without an id cannot be acted on and are dropped, as are records
/// whose display name normalizes to nothing.
fn extract(record: &MemberRecord) -> Option<(InputName, &str)> {
    let member_id = record.member_id.trim();
    if member_id.is_empty() {
        debug!(display_name = %record.display_name, "Dropping member record without id");
        return None;
    }

    match InputName::new(&record.display_name) {
        Some(name) => Some((name, member_id)),
        None => {
            debug!(member_id = %member_id, "Dropping member record without display name");
            None
        }
    }
}

/// Pick the input name a member name is attributed to
fn attribute<'a>(
    member_name: &InputName,
    inputs: &'a [InputName],
    exact_index: &HashSet<&str>,
    mode: MatchMode,
) -> Option<&'a InputName> {
    match mode {
        MatchMode::Exact => {
            if exact_index.contains(member_name.as_str()) {
                inputs.iter().find(|name| *name == member_name)
            } else {
                None
            }
        }
        MatchMode::Contains => inputs
            .iter()
            .find(|name| name.overlaps(member_name.as_str())),
    }
}

/// Match `records` against `input_names` and partition the batch
///
/// Input names are deduplicated (first occurrence kept). Records repeating
/// an already-seen member id are ignored, so overlapping per-name responses
/// do not double-count. `found` follows record order; `not_found` follows
/// input order.
pub fn reconcile(
    input_names: &[InputName],
    records: &[MemberRecord],
    mode: MatchMode,
) -> BatchOutcome {
    let inputs = dedup_preserving_order(input_names);
    let exact_index: HashSet<&str> = inputs.iter().map(InputName::as_str).collect();

    let mut seen_ids = HashSet::new();
    let mut found = Vec::new();

    for record in records {
        let Some((member_name, member_id)) = extract(record) else {
            continue;
        };
        if !seen_ids.insert(member_id.to_string()) {
            debug!(member_id = %member_id, "Skipping duplicate member record");
            continue;
        }

        match attribute(&member_name, &inputs, &exact_index, mode) {
            Some(search_name) => found.push(MatchResult {
                search_name: search_name.clone(),
                member_name: member_name.to_string(),
                member_id: member_id.to_string(),
            }),
            None => debug!(
                member_name = %member_name,
                "Member record matches no input name"
            ),
        }
    }

    let found_names: HashSet<&str> = found.iter().map(|r| r.search_name.as_str()).collect();
    let not_found = inputs
        .iter()
        .filter(|name| !found_names.contains(name.as_str()))
        .cloned()
        .collect();

    BatchOutcome { found, not_found }
}

/// Merge per-request record lists and reconcile against the names whose
/// requests succeeded
///
/// Names whose request failed are reported in `not_found` even if another
/// request happened to return a record that would match them. The final
/// `not_found` list is in input batch order.
pub fn reconcile_partial(
    input_names: &[InputName],
    succeeded: &[InputName],
    records: &[MemberRecord],
    mode: MatchMode,
) -> BatchOutcome {
    let mut outcome = reconcile(succeeded, records, mode);

    let found_names: HashSet<&str> = outcome
        .found
        .iter()
        .map(|r| r.search_name.as_str())
        .collect();
    outcome.not_found = dedup_preserving_order(input_names)
        .into_iter()
        .filter(|name| !found_names.contains(name.as_str()))
        .collect();

    outcome
}
