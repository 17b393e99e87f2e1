//! Plain-text rendering of lookup results

use crate::error::GatewayError;
use crate::models::MatchResult;
use crate::services::batch_runner::BatchReport;
use crate::session::CopyStateTracker;
use pkid_common::InputName;
use std::io::{self, Write};

const COPIED_MARKER: &str = "[copied]";

fn width(cells: impl Iterator<Item = usize>, header: &str) -> usize {
    cells.chain(std::iter::once(header.chars().count())).max().unwrap_or(0)
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.chars().count());
    format!("{}{}", text, " ".repeat(fill))
}

/// Numbered results table; rows whose id is marked get a `[copied]` suffix
pub fn render_table<W: Write>(
    w: &mut W,
    found: &[MatchResult],
    copies: &CopyStateTracker,
) -> io::Result<()> {
    if found.is_empty() {
        return writeln!(w, "No matches.");
    }

    let row_w = width(std::iter::once(found.len().to_string().len()), "#");
    let search_w = width(found.iter().map(|r| r.search_name.as_str().chars().count()), "Search Name");
    let member_w = width(found.iter().map(|r| r.member_name.chars().count()), "Member Name");

    writeln!(
        w,
        "{:>row_w$}  {}  {}  Passkit ID",
        "#",
        pad("Search Name", search_w),
        pad("Member Name", member_w),
        row_w = row_w
    )?;

    for (i, result) in found.iter().enumerate() {
        let marker = if copies.is_marked(&result.member_id) {
            format!("  {}", COPIED_MARKER)
        } else {
            String::new()
        };
        writeln!(
            w,
            "{:>row_w$}  {}  {}  {}{}",
            i + 1,
            pad(result.search_name.as_str(), search_w),
            pad(&result.member_name, member_w),
            result.member_id,
            marker,
            row_w = row_w
        )?;
    }
    Ok(())
}

fn join(names: &[InputName]) -> String {
    names.iter().map(InputName::as_str).collect::<Vec<_>>().join(", ")
}

/// Table, summary line, then not-found names, failures and warnings
pub fn render_report<W: Write>(
    w: &mut W,
    report: &BatchReport,
    copies: &CopyStateTracker,
) -> io::Result<()> {
    render_table(w, &report.outcome.found, copies)?;
    writeln!(w)?;
    writeln!(w, "{}", report.summary())?;

    if !report.outcome.not_found.is_empty() {
        writeln!(w, "Not found: {}", join(&report.outcome.not_found))?;
    }
    for failure in &report.failures {
        writeln!(w, "Failed: {}", failure)?;
        if let Some(hint) = hint_for(&failure.error) {
            writeln!(w, "  hint: {}", hint)?;
        }
    }
    if !report.skipped.is_empty() {
        writeln!(w, "Skipped (cancelled): {}", join(&report.skipped))?;
    }
    for warning in &report.warnings {
        writeln!(w, "Warning: {}", warning)?;
    }
    Ok(())
}

/// Operator hint for errors that usually mean misconfiguration
pub fn hint_for(error: &GatewayError) -> Option<&'static str> {
    match error {
        GatewayError::Upstream { kind, .. } => kind.hint(),
        _ => None,
    }
}
