//! CSV export of match results
//!
//! Columns are fixed: `Search Name, Member Name, Passkit ID`. Fields
//! containing a comma, quote, CR or LF are quoted with doubled inner quotes.

use crate::models::MatchResult;
use pkid_common::{Error, InputName, Result};
use std::io::{self, Write};
use std::mem::take;

pub const CSV_HEADERS: [&str; 3] = ["Search Name", "Member Name", "Passkit ID"];

/// File name offered when no path is given
pub const DEFAULT_EXPORT_FILE: &str = "passkit_id_results.csv";

const BOM: &str = "\u{feff}";

/* ---------------- Writing ---------------- */

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<W: Write>(w: &mut W, row: &[&str]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            write!(w, ",")?;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    write!(w, "\r\n")
}

/// Write the header row and one row per result
///
/// `with_bom` prefixes a UTF-8 byte order mark so spreadsheet tools pick
/// the right encoding.
pub fn write_csv<W: Write>(found: &[MatchResult], mut writer: W, with_bom: bool) -> io::Result<()> {
    if with_bom {
        writer.write_all(BOM.as_bytes())?;
    }
    write_row(&mut writer, &CSV_HEADERS)?;
    for result in found {
        write_row(
            &mut writer,
            &[result.search_name.as_str(), &result.member_name, &result.member_id],
        )?;
    }
    writer.flush()
}

pub fn to_csv_string(found: &[MatchResult], with_bom: bool) -> String {
    let mut buf = Vec::new();
    // Writing to a Vec cannot fail
    let _ = write_csv(found, &mut buf, with_bom);
    String::from_utf8_lossy(&buf).into_owned()
}

/* ---------------- Parsing ---------------- */

/// Split CSV text into rows of fields (quotes and CRLF tolerant)
fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if matches!(chars.peek(), Some('"')) {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

/// Read results back from exported CSV
///
/// A leading BOM and the header row are skipped when present.
///
/// # Errors
///
/// [`Error::InvalidInput`] for rows without three fields or with an empty
/// search name.
pub fn parse_csv(text: &str) -> Result<Vec<MatchResult>> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut rows = parse_rows(text).into_iter().peekable();

    if let Some(first) = rows.peek() {
        if first.len() == CSV_HEADERS.len()
            && first.iter().zip(CSV_HEADERS).all(|(a, b)| a.trim() == b)
        {
            rows.next();
        }
    }

    rows.enumerate()
        .map(|(i, row)| {
            let [search, member, id]: [String; 3] = row.try_into().map_err(|row: Vec<String>| {
                Error::InvalidInput(format!(
                    "CSV row {} has {} fields, expected {}",
                    i + 1,
                    row.len(),
                    CSV_HEADERS.len()
                ))
            })?;
            let search_name = InputName::new(&search).ok_or_else(|| {
                Error::InvalidInput(format!("CSV row {} has an empty search name", i + 1))
            })?;
            Ok(MatchResult::new(search_name, member, id))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(search: &str, member: &str, id: &str) -> MatchResult {
        MatchResult::new(InputName::new(search).unwrap(), member, id)
    }

    #[test]
    fn test_header_and_rows() {
        let csv = to_csv_string(&[result("ann lee", "ANN LEE", "m1")], false);
        assert_eq!(csv, "Search Name,Member Name,Passkit ID\r\nANN LEE,ANN LEE,m1\r\n");
    }

    #[test]
    fn test_bom_prefix() {
        let csv = to_csv_string(&[], true);
        assert!(csv.starts_with('\u{feff}'));
        assert!(parse_csv(&csv).unwrap().is_empty());
    }

    #[test]
    fn test_quoting_round_trip() {
        let found = vec![
            result("o'neil, pat", "O'NEIL, PAT", "id,1"),
            result("ann", "ANN \"NAN\" LEE", "m2"),
        ];
        let csv = to_csv_string(&found, true);
        assert!(csv.contains("\"O'NEIL, PAT\""));
        assert!(csv.contains("\"ANN \"\"NAN\"\" LEE\""));
        assert_eq!(parse_csv(&csv).unwrap(), found);
    }

    #[test]
    fn test_parse_without_header_or_trailing_newline() {
        let parsed = parse_csv("ANN,ANN LEE,m1\nBOB,BOB LEE,m2").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].member_id, "m2");
    }

    #[test]
    fn test_parse_rejects_short_rows() {
        assert!(matches!(parse_csv("ANN,m1\n"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_csv(" ,ANN,m1\n"), Err(Error::InvalidInput(_))));
    }
}
