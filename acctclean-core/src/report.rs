// acctclean-core/src/report.rs
//! The per-run cleaning report.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::record::MalformedRecord;
use crate::rules::Decision;

/// Counts and diagnostics for one cleaning run.
///
/// Built up while the run progresses and handed back by value when it ends.
/// It carries nothing about file mutation, so a dry run and a real run over the
/// same input compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    pub source: PathBuf,
    pub total_lines: usize,
    pub kept: usize,
    pub removed: usize,
    pub anonymized: usize,
    pub malformed: usize,
    pub malformed_records: Vec<MalformedRecord>,
    /// Rule name -> number of records that rule decided.
    pub rule_hits: BTreeMap<String, usize>,
}

impl CleaningReport {
    pub(crate) fn new(source: PathBuf, total_lines: usize) -> Self {
        Self {
            source,
            total_lines,
            ..Self::default()
        }
    }

    pub(crate) fn record_malformed(&mut self, malformed: MalformedRecord) {
        self.malformed += 1;
        self.malformed_records.push(malformed);
    }

    pub(crate) fn record_decision(&mut self, decision: &Decision, rule: Option<&str>) {
        match decision {
            Decision::Keep => self.kept += 1,
            Decision::Remove => self.removed += 1,
            Decision::Anonymize { .. } => self.anonymized += 1,
        }
        if let Some(rule) = rule {
            *self.rule_hits.entry(rule.to_string()).or_default() += 1;
        }
    }

    /// Lines accounted for so far.
    pub fn classified(&self) -> usize {
        self.kept + self.removed + self.anonymized + self.malformed
    }

    /// `kept + removed + anonymized + malformed == total_lines`.
    pub fn is_balanced(&self) -> bool {
        self.classified() == self.total_lines
    }
}
