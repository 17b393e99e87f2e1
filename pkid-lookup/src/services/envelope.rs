//! Response envelope parsing
//!
//! Tenants and API versions wrap the member list differently. Each known
//! wrapping is an [`EnvelopeShape`]; shapes are tried in
//! [`EnvelopeShape::PRIORITY`] order and the first one that matches wins.
//! A body matching none of them yields `None`, which callers treat as zero
//! records plus a warning rather than a failure.

use serde_json::{Map, Value};
use std::fmt;

/// Keys that may hold the list at the top level of an object
pub const LIST_KEYS: [&str; 4] = ["members", "results", "data", "items"];

/// Keys that may hold the list under a `response` wrapper
pub const NESTED_LIST_KEYS: [&str; 3] = ["members", "results", "items"];

/// Keys wrapping a single record in a newline-delimited stream
pub const STREAM_RECORD_KEYS: [&str; 2] = ["result", "member"];

/// Known response wrappings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeShape {
    /// `[ {...}, {...} ]`
    BareList,
    /// `{"members": [...]}` and friends
    KeyedList,
    /// `{"response": {"members": [...]}}`
    NestedResponse,
    /// One `{"result": {...}}` object per line
    Ndjson,
}

impl EnvelopeShape {
    /// Order in which shapes are attempted
    pub const PRIORITY: [EnvelopeShape; 4] = [
        EnvelopeShape::BareList,
        EnvelopeShape::KeyedList,
        EnvelopeShape::NestedResponse,
        EnvelopeShape::Ndjson,
    ];

    /// Extract the record list if `body` has this shape
    ///
    /// `document` is the whole body parsed as one JSON value, when it is one.
    fn extract(self, body: &str, document: Option<&Value>) -> Option<Vec<Value>> {
        match self {
            EnvelopeShape::BareList => document?.as_array().cloned(),
            EnvelopeShape::KeyedList => list_under(document?.as_object()?, &LIST_KEYS),
            EnvelopeShape::NestedResponse => {
                let response = document?.get("response")?.as_object()?;
                list_under(response, &NESTED_LIST_KEYS)
            }
            EnvelopeShape::Ndjson => extract_stream(body, document),
        }
    }
}

impl fmt::Display for EnvelopeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnvelopeShape::BareList => "bare list",
            EnvelopeShape::KeyedList => "keyed list",
            EnvelopeShape::NestedResponse => "nested response",
            EnvelopeShape::Ndjson => "newline-delimited",
        };
        f.write_str(s)
    }
}

/// Record list pulled out of a response body
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEnvelope {
    pub shape: EnvelopeShape,
    pub items: Vec<Value>,
}

/// Try every known shape in priority order
///
/// A blank body is an empty stream (the streaming endpoint sends nothing
/// when there are no matches).
pub fn parse_envelope(body: &str) -> Option<ParsedEnvelope> {
    if body.trim().is_empty() {
        return Some(ParsedEnvelope {
            shape: EnvelopeShape::Ndjson,
            items: Vec::new(),
        });
    }

    let document = serde_json::from_str::<Value>(body).ok();

    EnvelopeShape::PRIORITY.iter().find_map(|shape| {
        shape
            .extract(body, document.as_ref())
            .map(|items| ParsedEnvelope {
                shape: *shape,
                items,
            })
    })
}

fn list_under(object: &Map<String, Value>, keys: &[&str]) -> Option<Vec<Value>> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(Value::as_array).cloned())
}

fn unwrap_stream_record(value: &Value) -> Option<Value> {
    STREAM_RECORD_KEYS
        .iter()
        .find_map(|key| value.get(*key).filter(|v| v.is_object()).cloned())
}

/// Newline-delimited objects, each wrapping one record
///
/// A single-line stream parses as a whole document, so that case is handled
/// first. Lines that are not wrapped records (errors, keep-alives) are
/// skipped; the shape matches only if at least one record was found.
fn extract_stream(body: &str, document: Option<&Value>) -> Option<Vec<Value>> {
    if let Some(doc) = document {
        return unwrap_stream_record(doc).map(|record| vec![record]);
    }

    let mut records = Vec::new();
    for (line_no, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => match unwrap_stream_record(&value) {
                Some(record) => records.push(record),
                None => tracing::debug!(line = line_no + 1, "Skipping stream line without a record"),
            },
            Err(e) => {
                tracing::debug!(line = line_no + 1, error = %e, "Skipping unparseable stream line");
            }
        }
    }

    if records.is_empty() {
        None
    } else {
        Some(records)
    }
}
