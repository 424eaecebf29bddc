// acctclean-core/src/rules/mod.rs
//! Rule engine.
//!
//! A `Rule` is a named predicate paired with the `Decision` it produces. Rules are
//! values: new retention policies are added by registering another `Rule` in a
//! `RuleSet`, never by adding a branch to the engine. A `RuleSet` is evaluated in
//! order and the first predicate that matches decides; later rules are not
//! consulted. When nothing matches the record is kept.
//!
//! Cross-record facts (closed accounts, duplicate survivors, the time reference)
//! live in a `RuleContext` built once before classification starts.
//!
//! License: MIT OR APACHE 2.0

pub mod compiler;
pub mod context;
pub mod predicates;

use log::debug;
use std::fmt;

use crate::errors::CleanerError;
use crate::mask::{loggable_account, MaskStyle};
use crate::record::Record;

pub use context::{ContextSettings, RuleContext};

/// What happens to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Remove,
    /// Keep the record with the listed fields masked.
    Anonymize { fields: Vec<String>, style: MaskStyle },
}

static DEFAULT_DECISION: Decision = Decision::Keep;

/// A capability that tells whether a rule applies to a record.
///
/// An `Err` means the predicate could not be evaluated on a well-formed record,
/// and the run is aborted.
pub trait Predicate: Send + Sync + fmt::Debug {
    fn matches(&self, record: &Record, ctx: &RuleContext) -> Result<bool, String>;
}

/// A named, prioritized predicate/action pair.
#[derive(Debug)]
pub struct Rule {
    pub name: String,
    pub predicate: Box<dyn Predicate>,
    pub action: Decision,
}

impl Rule {
    pub fn new(name: impl Into<String>, predicate: impl Predicate + 'static, action: Decision) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
            action,
        }
    }
}

/// The decision for one record and the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification<'a> {
    pub decision: &'a Decision,
    /// `None` when no rule matched and the default `Keep` applied.
    pub rule: Option<&'a str>,
}

/// An ordered collection of rules. Order is priority.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Appends a rule with the lowest priority so far.
    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classifies a record. First match wins.
    pub fn classify<'a>(
        &'a self,
        record: &Record,
        ctx: &RuleContext,
    ) -> Result<Classification<'a>, CleanerError> {
        for rule in &self.rules {
            let matched = rule
                .predicate
                .matches(record, ctx)
                .map_err(|reason| CleanerError::RuleEvaluation {
                    rule: rule.name.clone(),
                    line: record.line_number,
                    reason,
                })?;
            if matched {
                debug!(
                    "Line {} (account '{}'): rule '{}' -> {:?}",
                    record.line_number,
                    loggable_account(&record.account_id),
                    rule.name,
                    rule.action
                );
                return Ok(Classification {
                    decision: &rule.action,
                    rule: Some(rule.name.as_str()),
                });
            }
        }
        Ok(Classification {
            decision: &DEFAULT_DECISION,
            rule: None,
        })
    }
}
