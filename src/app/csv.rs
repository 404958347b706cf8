// src/app/csv.rs — spreadsheet-export parsing.
//
// The sheet export is plain comma-delimited text with a header line.
// Quoted fields may embed commas and escaped quotes (`""`); repeated
// values inside one cell (cast lists, still URLs) are pipe-delimited.

use std::collections::HashMap;

/// Strip a UTF-8 BOM if present.
pub fn trim_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// Split into lines, tolerating CRLF / lone-CR exports.
pub fn split_lines(text: &str) -> Vec<&str> {
    trim_bom(text)
        .split(['\n', '\r'])
        .filter(|l| !l.trim().is_empty())
        .collect()
}

/// Parse a single line into fields, honoring quotes and `""` escapes.
pub fn parse_line(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                current.push('"');
                chars.next();
            } else {
                in_quotes = !in_quotes;
            }
        } else if ch == delimiter && !in_quotes {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    fields.push(current);
    fields
}

/// Parse the whole document into rows of fields.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    split_lines(text)
        .into_iter()
        .map(|line| parse_line(line, ','))
        .collect()
}

/// Parse into per-row maps keyed by the (trimmed) header line. Every
/// value is trimmed; missing trailing cells become empty strings.
pub fn parse_to_records(text: &str) -> Vec<HashMap<String, String>> {
    let rows = parse_rows(text);
    if rows.len() < 2 {
        return Vec::new();
    }
    let headers: Vec<String> = rows[0].iter().map(|h| h.trim().to_string()).collect();

    rows[1..]
        .iter()
        .map(|row| {
            headers
                .iter()
                .enumerate()
                .map(|(j, key)| {
                    let value = row.get(j).map(|v| v.trim()).unwrap_or_default();
                    (key.clone(), value.to_string())
                })
                .collect()
        })
        .collect()
}

/// Split a pipe-delimited cell into trimmed, non-empty parts.
pub fn split_list(cell: &str) -> Vec<String> {
    cell.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Detect an HTML page substituted for an expected text response
/// (login walls, share-link redirects).
pub fn looks_like_html(text: &str) -> bool {
    let head: String = text.trim_start().chars().take(200).collect();
    let head = head.to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<title>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_field_keeps_embedded_comma() {
        assert_eq!(parse_line("a,\"b,c\",d", ','), vec!["a", "b,c", "d"]);
    }

    #[test]
    fn escaped_quotes_inside_quoted_field() {
        assert_eq!(
            parse_line("x,\"say \"\"hi\"\"\",y", ','),
            vec!["x", "say \"hi\"", "y"]
        );
    }

    #[test]
    fn empty_fields_survive() {
        assert_eq!(parse_line("a,,c", ','), vec!["a", "", "c"]);
        assert_eq!(parse_line(",", ','), vec!["", ""]);
    }

    #[test]
    fn records_use_header_and_trim_values() {
        let text = "\u{feff}Movie ID,Movie Name\r\n42, Blade Runner \r\n7,Alien\n";
        let recs = parse_to_records(text);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0]["Movie ID"], "42");
        assert_eq!(recs[0]["Movie Name"], "Blade Runner");
        assert_eq!(recs[1]["Movie Name"], "Alien");
    }

    #[test]
    fn short_rows_fill_blank_cells() {
        let recs = parse_to_records("a,b,c\n1,2\n");
        assert_eq!(recs[0]["c"], "");
    }

    #[test]
    fn pipe_lists_split_and_trim() {
        assert_eq!(
            split_list("Harrison Ford | Sean Young ||Rutger Hauer"),
            vec!["Harrison Ford", "Sean Young", "Rutger Hauer"]
        );
        assert!(split_list("  ").is_empty());
    }

    #[test]
    fn html_redirect_detection() {
        assert!(looks_like_html("<!DOCTYPE html><html>…"));
        assert!(looks_like_html("  <html lang=\"en\">"));
        assert!(looks_like_html("<head><title>Sign in</title></head>"));
        assert!(!looks_like_html("Movie ID,Movie Name\n1,Alien"));
    }
}
