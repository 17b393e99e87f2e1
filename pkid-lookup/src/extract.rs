//! Name extraction from recognized text
//!
//! Screenshots are turned into text by an external OCR tool; this module
//! only picks the lines that look like member names. The lookup core never
//! depends on it.

use once_cell::sync::Lazy;
use pkid_common::names::{dedup_preserving_order, normalize, MAX_BATCH_SIZE};
use pkid_common::{Error, InputName, Result};
use regex::Regex;

/// Two to four words of uppercase A-Z letters
static NAME_LINE: Lazy<std::result::Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[A-Z]+( [A-Z]+){1,3}$"));

/// Source of candidate names
pub trait TextExtractor {
    fn extract(&self, input: &[u8]) -> Result<Vec<InputName>>;
}

/// Extractor for text that has already been recognized
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, input: &[u8]) -> Result<Vec<InputName>> {
        let text = String::from_utf8_lossy(input);
        names_from_text(&text)
    }
}

/// Pick name-looking lines out of `text`
///
/// Lines are normalized first. Matches are deduplicated in order and capped
/// at the batch size.
pub fn names_from_text(text: &str) -> Result<Vec<InputName>> {
    let pattern = NAME_LINE
        .as_ref()
        .map_err(|e| Error::Internal(format!("name pattern: {}", e)))?;

    let candidates: Vec<InputName> = text
        .lines()
        .map(normalize)
        .filter(|line| pattern.is_match(line))
        .filter_map(|line| InputName::new(&line))
        .collect();

    let mut names = dedup_preserving_order(&candidates);
    names.truncate(MAX_BATCH_SIZE);

    tracing::debug!(
        lines = text.lines().count(),
        names = names.len(),
        "Extracted names from text"
    );
    Ok(names)
}
