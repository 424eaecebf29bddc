// acctclean-core/src/rules/predicates.rs
//! Built-in predicates for the canonical retention rule families.
//!
//! Each predicate is a small value implementing [`Predicate`]. Custom policies
//! can implement the trait directly or wrap a closure in [`FnPredicate`].

use chrono::Duration;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;

use super::{Predicate, RuleContext};
use crate::parser::parse_timestamp;
use crate::record::{EventType, Record};

/// Matches every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

impl Predicate for Always {
    fn matches(&self, _record: &Record, _ctx: &RuleContext) -> Result<bool, String> {
        Ok(true)
    }
}

/// Record is older than the retention window, measured from the context's time reference.
///
/// With `timestamp_field` set, age is taken from that attribute instead of the
/// record timestamp. A missing attribute does not match; a present attribute that
/// is not a timestamp is an evaluation error.
#[derive(Debug, Clone)]
pub struct OlderThan {
    pub max_age: Duration,
    pub timestamp_field: Option<String>,
}

impl OlderThan {
    pub fn days(days: i64) -> Option<Self> {
        Duration::try_days(days).map(|max_age| Self {
            max_age,
            timestamp_field: None,
        })
    }
}

impl Predicate for OlderThan {
    fn matches(&self, record: &Record, ctx: &RuleContext) -> Result<bool, String> {
        let timestamp = match &self.timestamp_field {
            None => record.timestamp,
            Some(field) => match record.attribute(field) {
                None => return Ok(false),
                Some(value) => parse_timestamp(value).ok_or_else(|| {
                    format!("attribute '{}' is not a timestamp: '{}'", field, value)
                })?,
            },
        };
        Ok(ctx.now().signed_duration_since(timestamp) > self.max_age)
    }
}

/// Account is closed, either by configuration or by a closing event in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountClosed;

impl Predicate for AccountClosed {
    fn matches(&self, record: &Record, ctx: &RuleContext) -> Result<bool, String> {
        Ok(ctx.is_closed(&record.account_id))
    }
}

/// A newer record exists for the same account and event type.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupersededDuplicate;

impl Predicate for SupersededDuplicate {
    fn matches(&self, record: &Record, ctx: &RuleContext) -> Result<bool, String> {
        Ok(ctx.is_superseded(record))
    }
}

#[derive(Debug, Clone)]
pub struct EventTypeIn(HashSet<EventType>);

impl EventTypeIn {
    pub fn new(kinds: impl IntoIterator<Item = EventType>) -> Self {
        Self(kinds.into_iter().collect())
    }
}

impl Predicate for EventTypeIn {
    fn matches(&self, record: &Record, _ctx: &RuleContext) -> Result<bool, String> {
        Ok(self.0.contains(&record.event_type))
    }
}

/// Attribute is present and its value matches the pattern.
#[derive(Debug, Clone)]
pub struct AttributeMatches {
    pub key: String,
    pub pattern: Regex,
}

impl Predicate for AttributeMatches {
    fn matches(&self, record: &Record, _ctx: &RuleContext) -> Result<bool, String> {
        Ok(record
            .attribute(&self.key)
            .is_some_and(|value| self.pattern.is_match(value)))
    }
}

#[derive(Debug, Clone)]
pub struct AccountMatches(pub Regex);

impl Predicate for AccountMatches {
    fn matches(&self, record: &Record, _ctx: &RuleContext) -> Result<bool, String> {
        Ok(self.0.is_match(&record.account_id))
    }
}

/// Wraps a closure so ad-hoc policies can be registered without a new type.
pub struct FnPredicate<F>(F);

impl<F> FnPredicate<F>
where
    F: Fn(&Record, &RuleContext) -> Result<bool, String> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for FnPredicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnPredicate")
    }
}

impl<F> Predicate for FnPredicate<F>
where
    F: Fn(&Record, &RuleContext) -> Result<bool, String> + Send + Sync,
{
    fn matches(&self, record: &Record, ctx: &RuleContext) -> Result<bool, String> {
        (self.0)(record, ctx)
    }
}
