// acctclean-core/src/record.rs
//! Data model for account activity log entries.
//!
//! A log is read into `RawLine`s, and each line is parsed into either a `Record`
//! or a `MalformedRecord`. Both keep the 1-based line number of the line they
//! came from, which is used for diagnostics and for restoring the original order
//! when the cleaned log is written back.
//!
//! License: MIT OR APACHE 2.0

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

/// Line terminator that followed a line in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// An unparsed line of the input log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 1-based position of the line in the input file.
    pub number: usize,
    /// Line content without its terminator. Lossily decoded if the bytes are not UTF-8.
    pub text: String,
    pub ending: LineEnding,
    undecodable: Option<Vec<u8>>,
}

impl RawLine {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
            ending: LineEnding::Lf,
            undecodable: None,
        }
    }

    /// Builds a line from input bytes. Bytes that are not UTF-8 are kept as-is
    /// so the line can be written back unchanged.
    pub fn from_bytes(number: usize, bytes: &[u8], ending: LineEnding) -> Self {
        match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Self {
                number,
                text,
                ending,
                undecodable: None,
            },
            Err(e) => {
                let bytes = e.into_bytes();
                Self {
                    number,
                    text: String::from_utf8_lossy(&bytes).into_owned(),
                    ending,
                    undecodable: Some(bytes),
                }
            }
        }
    }

    pub fn with_ending(mut self, ending: LineEnding) -> Self {
        self.ending = ending;
        self
    }

    pub fn is_utf8(&self) -> bool {
        self.undecodable.is_none()
    }

    /// The line exactly as read, without its terminator.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.undecodable {
            Some(bytes) => bytes,
            None => self.text.as_bytes(),
        }
    }
}

/// The kind of activity a record describes.
///
/// Known kinds are matched case-insensitively and with `-`/`_` ignored, so
/// `ValidationOk`, `validation_ok` and `validation-ok` are the same kind.
/// Anything else is kept verbatim as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    Login,
    Logout,
    Create,
    Update,
    ValidationOk,
    ValidationError,
    Close,
    Delete,
    Other(String),
}

impl EventType {
    pub fn parse(text: &str) -> Self {
        let normalized: String = text
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "login" => EventType::Login,
            "logout" => EventType::Logout,
            "create" => EventType::Create,
            "update" => EventType::Update,
            "validationok" => EventType::ValidationOk,
            "validationerror" => EventType::ValidationError,
            "close" | "closed" => EventType::Close,
            "delete" | "deleted" => EventType::Delete,
            _ => EventType::Other(text.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventType::Login => "login",
            EventType::Logout => "logout",
            EventType::Create => "create",
            EventType::Update => "update",
            EventType::ValidationOk => "validation_ok",
            EventType::ValidationError => "validation_error",
            EventType::Close => "close",
            EventType::Delete => "delete",
            EventType::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successfully parsed log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub line_number: usize,
    pub account_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    /// Extra fields beyond the first three columns.
    pub attributes: BTreeMap<String, String>,
    /// The original line, re-emitted unchanged for `Keep` decisions.
    pub raw: String,
    pub(crate) account_span: Range<usize>,
    pub(crate) attribute_spans: BTreeMap<String, Range<usize>>,
}

impl Record {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Byte range of a maskable field's value inside `raw`.
    pub(crate) fn value_span(&self, field: &str) -> Option<Range<usize>> {
        if field == crate::mask::ACCOUNT_ID_FIELD {
            Some(self.account_span.clone())
        } else {
            self.attribute_spans.get(field).cloned()
        }
    }
}

/// A line that could not be parsed. It is reported, never classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedRecord {
    pub line_number: usize,
    pub raw: String,
    pub reason: String,
}

/// Result of parsing a single `RawLine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Parsed(Record),
    Malformed(MalformedRecord),
}

impl ParseOutcome {
    pub fn line_number(&self) -> usize {
        match self {
            ParseOutcome::Parsed(r) => r.line_number,
            ParseOutcome::Malformed(m) => m.line_number,
        }
    }
}
