// acctclean-core/src/parser.rs
//! Record parser.
//!
//! Turns `RawLine`s into `Record`s. A line that does not fit the schema becomes a
//! `MalformedRecord` with a human-readable reason; parsing never aborts a run and
//! never looks at any line other than the one it is given.
//!
//! Line layout: `timestamp<d>account_id<d>event_type[<d>extra...]` where `<d>` is
//! the configured delimiter. Extra fields are `key=value`, `Label: value`, or plain
//! positional values stored as `fieldN`.
//!
//! License: MIT OR APACHE 2.0

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

use crate::record::{EventType, LineEnding, MalformedRecord, ParseOutcome, RawLine, Record};

/// Naive layouts accepted after RFC 3339 fails. Interpreted as UTC.
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// How fields are laid out on a line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogFormat {
    /// Single-character field separator. The validation logs use `\t`.
    pub delimiter: char,
    /// Remove `Label:` prefixes from field values before interpreting them.
    pub strip_field_labels: bool,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self {
            delimiter: ',',
            strip_field_labels: true,
        }
    }
}

/// Splits file content into numbered raw lines, each carrying the terminator
/// that followed it. A final line without a terminator takes the previous
/// line's, so the cleaned log always ends with one.
pub fn split_raw_lines(content: impl AsRef<[u8]>) -> Vec<RawLine> {
    let mut rest = content.as_ref();
    let mut lines = Vec::new();
    let mut last_ending = LineEnding::Lf;
    while !rest.is_empty() {
        let number = lines.len() + 1;
        match rest.iter().position(|b| *b == b'\n') {
            Some(idx) => {
                let (body, ending) = match rest[..idx].strip_suffix(b"\r") {
                    Some(body) => (body, LineEnding::CrLf),
                    None => (&rest[..idx], LineEnding::Lf),
                };
                lines.push(RawLine::from_bytes(number, body, ending));
                last_ending = ending;
                rest = &rest[idx + 1..];
            }
            None => {
                lines.push(RawLine::from_bytes(number, rest, last_ending));
                break;
            }
        }
    }
    lines
}

/// Lazily parses every line. The iterator is finite and is not restartable;
/// a new run re-parses from the first line.
pub fn parse_lines<'a>(
    lines: &'a [RawLine],
    format: &'a LogFormat,
) -> impl Iterator<Item = ParseOutcome> + 'a {
    lines.iter().map(move |line| parse_line(line, format))
}

/// Parses one line into a `Record`, or explains why it could not.
pub fn parse_line(line: &RawLine, format: &LogFormat) -> ParseOutcome {
    match try_parse(line, format) {
        Ok(record) => ParseOutcome::Parsed(record),
        Err(reason) => ParseOutcome::Malformed(MalformedRecord {
            line_number: line.number,
            raw: line.text.clone(),
            reason,
        }),
    }
}

fn try_parse(line: &RawLine, format: &LogFormat) -> Result<Record, String> {
    if !line.is_utf8() {
        return Err("invalid UTF-8".to_string());
    }
    let text = line.text.as_str();
    if text.trim().is_empty() {
        return Err("empty line".to_string());
    }

    let columns = split_spans(text, format.delimiter);
    if columns.len() < 3 {
        return Err(format!(
            "expected at least 3 fields (timestamp, account id, event type), found {}",
            columns.len()
        ));
    }

    let timestamp_span = leading_value(text, columns[0].clone(), format);
    let account_span = leading_value(text, columns[1].clone(), format);
    let event_span = leading_value(text, columns[2].clone(), format);

    let timestamp_text = &text[timestamp_span];
    if timestamp_text.is_empty() {
        return Err("missing timestamp".to_string());
    }
    let timestamp = parse_timestamp(timestamp_text)
        .ok_or_else(|| format!("unparsable timestamp '{}'", timestamp_text))?;

    let account_id = &text[account_span.clone()];
    if account_id.is_empty() {
        return Err("empty account id".to_string());
    }

    let event_text = &text[event_span];
    if event_text.is_empty() {
        return Err("missing event type".to_string());
    }

    let mut attributes = BTreeMap::new();
    let mut attribute_spans = BTreeMap::new();
    let mut idx = 3;
    while idx < columns.len() {
        let (key, mut span) = extra_field(text, columns[idx].clone(), idx + 1, format);
        // A JSON object value may itself contain the delimiter.
        if text[span.clone()].starts_with('{') {
            while brace_depth(&text[span.clone()]) > 0 && idx + 1 < columns.len() {
                idx += 1;
                span.end = columns[idx].end;
            }
            span = trim_span(text, span);
        }
        if attributes.contains_key(&key) {
            return Err(format!("duplicate attribute '{}'", key));
        }
        attributes.insert(key.clone(), text[span.clone()].to_string());
        attribute_spans.insert(key, span);
        idx += 1;
    }

    Ok(Record {
        line_number: line.number,
        account_id: account_id.to_string(),
        timestamp,
        event_type: EventType::parse(event_text),
        attributes,
        raw: text.to_string(),
        account_span,
        attribute_spans,
    })
}

/// Parses the timestamp layouts accepted in a log.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn split_spans(text: &str, delimiter: char) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(delimiter) {
        spans.push(start..idx);
        start = idx + delimiter.len_utf8();
    }
    spans.push(start..text.len());
    spans
}

fn trim_span(text: &str, span: Range<usize>) -> Range<usize> {
    let slice = &text[span.clone()];
    let trimmed_start = slice.trim_start();
    if trimmed_start.is_empty() {
        return span.end..span.end;
    }
    let start = span.start + (slice.len() - trimmed_start.len());
    let end = start + trimmed_start.trim_end().len();
    start..end
}

/// Net count of `{` over `}` outside double-quoted strings.
fn brace_depth(s: &str) -> i32 {
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;
    for c in s.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else {
            match c {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
        }
    }
    depth
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_attribute_key(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Splits an identifier label off a value span: `Status: ok` -> (`Status`, `ok`).
fn split_label<'a>(text: &'a str, span: Range<usize>) -> Option<(&'a str, Range<usize>)> {
    let value = &text[span.clone()];
    let colon = value.find(':')?;
    let label = value[..colon].trim_end();
    if !is_identifier(label) {
        return None;
    }
    Some((label, trim_span(text, span.start + colon + 1..span.end)))
}

fn leading_value(text: &str, column: Range<usize>, format: &LogFormat) -> Range<usize> {
    let span = trim_span(text, column);
    if format.strip_field_labels {
        if let Some((_, value)) = split_label(text, span.clone()) {
            return value;
        }
    }
    span
}

fn extra_field(
    text: &str,
    column: Range<usize>,
    position: usize,
    format: &LogFormat,
) -> (String, Range<usize>) {
    let span = trim_span(text, column);
    if format.strip_field_labels {
        if let Some((label, value)) = split_label(text, span.clone()) {
            return (label.to_string(), value);
        }
    }
    let field = &text[span.clone()];
    if let Some(eq) = field.find('=') {
        let key = field[..eq].trim_end();
        if is_attribute_key(key) {
            return (key.to_string(), trim_span(text, span.start + eq + 1..span.end));
        }
    }
    (format!("field{}", position), span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse(text: &str) -> ParseOutcome {
        parse_line(&RawLine::new(1, text), &LogFormat::default())
    }

    fn parsed(text: &str) -> Record {
        match parse(text) {
            ParseOutcome::Parsed(r) => r,
            ParseOutcome::Malformed(m) => panic!("expected record, got malformed: {}", m.reason),
        }
    }

    fn reason(text: &str) -> String {
        match parse(text) {
            ParseOutcome::Malformed(m) => m.reason,
            ParseOutcome::Parsed(r) => panic!("expected malformed, got record for {}", r.account_id),
        }
    }

    #[test]
    fn test_parses_minimal_line() {
        let record = parsed("2023-01-01,acct1,login");
        assert_eq!(record.account_id, "acct1");
        assert_eq!(record.event_type, EventType::Login);
        assert_eq!(record.timestamp, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
        assert!(record.attributes.is_empty());
        assert_eq!(record.raw, "2023-01-01,acct1,login");
    }

    #[test]
    fn test_timestamp_layouts() {
        let expected = Utc.with_ymd_and_hms(2023, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(parse_timestamp("2023-03-04T05:06:07Z"), Some(expected));
        assert_eq!(parse_timestamp("2023-03-04T07:06:07+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-03-04 05:06:07"), Some(expected));
        assert_eq!(parse_timestamp("2023-03-04T05:06:07"), Some(expected));
        assert!(parse_timestamp("2023-03-04 05:06:07.250").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_malformed_reasons() {
        assert_eq!(reason(""), "empty line");
        assert_eq!(reason("   "), "empty line");
        assert!(reason("2023-01-01,acct1").contains("expected at least 3 fields"));
        assert_eq!(reason("x,,bad"), "unparsable timestamp 'x'");
        assert_eq!(reason("2023-01-01,,login"), "empty account id");
        assert_eq!(reason("2023-01-01, ,login"), "empty account id");
        assert_eq!(reason(",acct1,login"), "missing timestamp");
        assert_eq!(reason("2023-01-01,acct1,"), "missing event type");
        assert_eq!(reason("2023-01-01,acct1,login,ip=1,ip=2"), "duplicate attribute 'ip'");
    }

    #[test]
    fn test_attributes_key_value_label_and_positional() {
        let record = parsed("2023-01-01,acct1,login,ip=10.0.0.1,Status: OK,free text,url=https://x.io");
        assert_eq!(record.attribute("ip"), Some("10.0.0.1"));
        assert_eq!(record.attribute("Status"), Some("OK"));
        assert_eq!(record.attribute("field6"), Some("free text"));
        assert_eq!(record.attribute("url"), Some("https://x.io"));
    }

    #[test]
    fn test_field_labels_are_stripped_from_leading_columns() {
        let format = LogFormat {
            delimiter: '\t',
            strip_field_labels: true,
        };
        let line = RawLine::new(7, "TransactionTime:2023-02-01 10:00:00\tAccountNumber: 0012\tValidationOk");
        let ParseOutcome::Parsed(record) = parse_line(&line, &format) else {
            panic!("tab-separated labelled line should parse");
        };
        assert_eq!(record.line_number, 7);
        assert_eq!(record.account_id, "0012");
        assert_eq!(record.event_type, EventType::ValidationOk);
        assert_eq!(record.timestamp, Utc.with_ymd_and_hms(2023, 2, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_labels_kept_when_stripping_disabled() {
        let format = LogFormat {
            delimiter: ',',
            strip_field_labels: false,
        };
        let ParseOutcome::Parsed(record) =
            parse_line(&RawLine::new(1, "2023-01-01,user:42,login"), &format)
        else {
            panic!("line should parse");
        };
        assert_eq!(record.account_id, "user:42");
    }

    #[test]
    fn test_account_span_points_into_raw() {
        let record = parsed("2023-01-01, acct9 ,login, note = hi ");
        assert_eq!(&record.raw[record.account_span.clone()], "acct9");
        let span = record.attribute_spans.get("note").cloned().unwrap();
        assert_eq!(&record.raw[span], "hi");
    }

    #[test]
    fn test_split_raw_lines_keeps_each_terminator() {
        let lines = split_raw_lines("a\r\nb\nc\r\n");
        assert_eq!(
            lines,
            vec![
                RawLine::new(1, "a").with_ending(LineEnding::CrLf),
                RawLine::new(2, "b"),
                RawLine::new(3, "c").with_ending(LineEnding::CrLf),
            ]
        );

        let lines = split_raw_lines("a\r\nb");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].ending, LineEnding::CrLf, "unterminated last line borrows the previous ending");

        assert!(split_raw_lines("").is_empty());
        assert_eq!(split_raw_lines("\n\n").len(), 2);
    }

    #[test]
    fn test_invalid_utf8_line_is_malformed() {
        let lines = split_raw_lines(&b"2023-01-01,a,login\n2023-01-02,\xff\xfe,login\n"[..]);
        assert_eq!(lines.len(), 2);
        let ParseOutcome::Malformed(m) = parse_line(&lines[1], &LogFormat::default()) else {
            panic!("undecodable line should be malformed");
        };
        assert_eq!(m.line_number, 2);
        assert_eq!(m.reason, "invalid UTF-8");
        assert!(matches!(parse_line(&lines[0], &LogFormat::default()), ParseOutcome::Parsed(_)));
    }

    #[test]
    fn test_json_status_spans_delimiters() {
        let format = LogFormat {
            delimiter: '\t',
            strip_field_labels: true,
        };
        let text = "2023-05-01 10:00:00\tacct1\tValidationError\tStatus: {\"nc\":\"0012345678\",\t\"sheba\":\"IR82054\"}\tretry";
        let ParseOutcome::Parsed(record) = parse_line(&RawLine::new(1, text), &format) else {
            panic!("validation error line should parse");
        };
        assert_eq!(
            record.attribute("Status"),
            Some("{\"nc\":\"0012345678\",\t\"sheba\":\"IR82054\"}")
        );
        assert_eq!(record.attribute("field6"), Some("retry"));
        assert_eq!(record.attributes.len(), 2);
    }

    #[test]
    fn test_brace_depth_ignores_quoted_braces() {
        assert_eq!(brace_depth("{\"a\":\"}\""), 1);
        assert_eq!(brace_depth("{\"a\":{\"b\":1}}"), 0);
        assert_eq!(brace_depth("{\"a\":\"\\\"{\""), 1);
    }

    #[test]
    fn test_unbalanced_json_runs_to_end_of_line() {
        let record = parsed("2023-01-01,acct1,login,Status: {\"a\":1,\"b\":2");
        assert_eq!(record.attribute("Status"), Some("{\"a\":1,\"b\":2"));
    }

    #[test]
    fn test_parse_lines_preserves_order() {
        let lines = split_raw_lines("2023-01-01,a,login\nbad\n2023-01-02,b,logout\n");
        let format = LogFormat::default();
        let numbers: Vec<usize> = parse_lines(&lines, &format).map(|o| o.line_number()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }
}
