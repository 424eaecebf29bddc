// acctclean-core/src/mask.rs
//! Field masking for `Anonymize` decisions and PII-safe debug logging.
//!
//! Masking rewrites only the value bytes of the selected fields inside the
//! record's original line, so delimiters, labels and `key=` prefixes survive.
//! Both mask styles are idempotent: an already-masked value is left alone,
//! which keeps a cleaned log a fixed point under the same rules.

use lazy_static::lazy_static;
use log::debug;
use sha2::{Digest, Sha256};
use std::ops::Range;

use crate::record::Record;

/// Field name that addresses the record's account id rather than an attribute.
pub const ACCOUNT_ID_FIELD: &str = "account_id";

/// Prefix carried by every hashed value.
pub const HASH_PREFIX: &str = "anon-";

const HASH_HEX_LEN: usize = 16;

lazy_static! {
    /// Whether raw account ids may appear in debug logs. Read once.
    static ref PII_DEBUG_ALLOWED: bool = {
        std::env::var("ACCTCLEAN_ALLOW_DEBUG_PII")
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    };
}

/// How a masked value is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum MaskStyle {
    /// Deterministic pseudonym, distinct inputs stay distinct.
    #[default]
    Hash,
    /// Fixed replacement text. Surrounding whitespace is not written.
    Redact(String),
}

impl MaskStyle {
    pub fn apply(&self, value: &str) -> String {
        match self {
            MaskStyle::Hash => pseudonymize(value),
            MaskStyle::Redact(replacement) => replacement.trim().to_string(),
        }
    }

    /// Field values are compared trimmed, as the parser hands them out.
    fn is_masked(&self, value: &str) -> bool {
        match self {
            MaskStyle::Hash => value.starts_with(HASH_PREFIX),
            MaskStyle::Redact(replacement) => value == replacement.trim(),
        }
    }
}

/// `anon-` followed by the first 16 hex digits of SHA-256(value).
pub fn pseudonymize(value: &str) -> String {
    if value.starts_with(HASH_PREFIX) {
        return value.to_string();
    }
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}{}", HASH_PREFIX, &digest[..HASH_HEX_LEN])
}

/// Re-emits `record.raw` with the named fields masked. Fields the record does
/// not carry are skipped.
pub fn mask_record(record: &Record, fields: &[String], style: &MaskStyle) -> String {
    let mut spans: Vec<Range<usize>> = fields
        .iter()
        .filter_map(|field| record.value_span(field))
        .filter(|span| !style.is_masked(&record.raw[span.clone()]))
        .collect();
    spans.sort_by_key(|span| span.start);
    spans.dedup();

    let mut out = String::with_capacity(record.raw.len());
    let mut last_end = 0usize;
    for span in spans {
        out.push_str(&record.raw[last_end..span.start]);
        out.push_str(&style.apply(&record.raw[span.clone()]));
        last_end = span.end;
    }
    out.push_str(&record.raw[last_end..]);

    debug!(
        "Masked {} field(s) on line {} for account '{}'",
        fields.len(),
        record.line_number,
        loggable_account(&record.account_id)
    );
    out
}

pub fn redact_sensitive(s: &str) -> String {
    const MAX_LEN: usize = 8;
    if s.len() <= MAX_LEN {
        "[REDACTED]".to_string()
    } else {
        format!("[REDACTED: {} chars]", s.len())
    }
}

/// Account ids are only written to logs verbatim when explicitly allowed.
pub fn loggable_account(account_id: &str) -> String {
    if *PII_DEBUG_ALLOWED {
        account_id.to_string()
    } else {
        redact_sensitive(account_id)
    }
}
