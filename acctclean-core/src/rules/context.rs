// acctclean-core/src/rules/context.rs
//! Read-only, cross-record state shared by every rule in a run.

use chrono::{DateTime, Utc};
use log::debug;
use std::collections::{HashMap, HashSet};

use crate::record::{EventType, Record};

/// Inputs to context building that come from configuration rather than the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSettings {
    /// Accounts known to be closed regardless of what the log says.
    pub closed_accounts: Vec<String>,
    /// Event types that mark an account as closed when they appear in the log.
    pub closing_events: Vec<EventType>,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            closed_accounts: Vec::new(),
            closing_events: vec![EventType::Close, EventType::Delete],
        }
    }
}

/// Built once per run from every parsed record, immutable afterwards.
#[derive(Debug, Clone)]
pub struct RuleContext {
    now: DateTime<Utc>,
    closed_accounts: HashSet<String>,
    /// (account, event type) -> (timestamp, line) of the record that survives collapsing.
    survivors: HashMap<(String, EventType), (DateTime<Utc>, usize)>,
}

impl RuleContext {
    pub fn build<'a, I>(records: I, now: DateTime<Utc>, settings: &ContextSettings) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut closed_accounts: HashSet<String> = settings.closed_accounts.iter().cloned().collect();
        let mut survivors: HashMap<(String, EventType), (DateTime<Utc>, usize)> = HashMap::new();

        for record in records {
            if settings.closing_events.contains(&record.event_type) {
                closed_accounts.insert(record.account_id.clone());
            }
            let key = (record.account_id.clone(), record.event_type.clone());
            let candidate = (record.timestamp, record.line_number);
            survivors
                .entry(key)
                .and_modify(|best| {
                    // Tuple order: later timestamp wins, then later line.
                    if candidate > *best {
                        *best = candidate;
                    }
                })
                .or_insert(candidate);
        }

        debug!(
            "Rule context built: now={}, {} closed account(s), {} duplicate group(s)",
            now.to_rfc3339(),
            closed_accounts.len(),
            survivors.len()
        );

        Self {
            now,
            closed_accounts,
            survivors,
        }
    }

    /// The run's time reference. Rules never read the wall clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn is_closed(&self, account_id: &str) -> bool {
        self.closed_accounts.contains(account_id)
    }

    /// True when a more recent record exists for the same account and event type.
    pub fn is_superseded(&self, record: &Record) -> bool {
        let key = (record.account_id.clone(), record.event_type.clone());
        match self.survivors.get(&key) {
            Some((_, line)) => *line != record.line_number,
            None => false,
        }
    }
}
