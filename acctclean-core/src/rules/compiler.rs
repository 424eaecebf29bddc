//! compiler.rs - Turns rule specifications into a runnable `RuleSet`.
//!
//! Every spec is checked and all problems are collected before failing, so a
//! broken configuration is reported in one pass instead of one error at a time.
//!
//! License: MIT OR APACHE 2.0

use log::debug;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

use super::predicates::{
    AccountClosed, AccountMatches, Always, AttributeMatches, EventTypeIn, OlderThan, SupersededDuplicate,
};
use super::{Decision, Predicate, Rule, RuleSet};
use crate::config::{ActionKind, Condition, MaskKind, RuleSpec};
use crate::errors::CleanerError;
use crate::mask::{MaskStyle, ACCOUNT_ID_FIELD};
use crate::record::EventType;

/// Maximum allowed length for a regex pattern string.
pub const MAX_PATTERN_LENGTH: usize = 500;

fn build_regex(rule: &str, pattern: &str) -> Result<Regex, CleanerError> {
    if pattern.len() > MAX_PATTERN_LENGTH {
        return Err(CleanerError::RuleCompilation(
            rule.to_string(),
            format!(
                "pattern length ({}) exceeds maximum allowed ({})",
                pattern.len(),
                MAX_PATTERN_LENGTH
            ),
        ));
    }
    RegexBuilder::new(pattern)
        .size_limit(10 * (1 << 20))
        .build()
        .map_err(|e| CleanerError::RuleCompilation(rule.to_string(), e.to_string()))
}

fn compile_predicate(spec: &RuleSpec) -> Result<Box<dyn Predicate>, CleanerError> {
    let predicate: Box<dyn Predicate> = match &spec.when {
        Condition::OlderThan { days, timestamp_field } => {
            if *days < 0 {
                return Err(CleanerError::RuleCompilation(
                    spec.name.clone(),
                    format!("retention window must not be negative (got {} days)", days),
                ));
            }
            let mut older = OlderThan::days(*days).ok_or_else(|| {
                CleanerError::RuleCompilation(
                    spec.name.clone(),
                    format!("retention window of {} days is out of range", days),
                )
            })?;
            older.timestamp_field = timestamp_field.clone();
            Box::new(older)
        }
        Condition::AccountClosed => Box::new(AccountClosed),
        Condition::SupersededDuplicate => Box::new(SupersededDuplicate),
        Condition::EventType { types } => {
            if types.is_empty() {
                return Err(CleanerError::RuleCompilation(
                    spec.name.clone(),
                    "event_type condition lists no types".to_string(),
                ));
            }
            Box::new(EventTypeIn::new(types.iter().map(|t| EventType::parse(t))))
        }
        Condition::AttributeMatches { key, pattern } => Box::new(AttributeMatches {
            key: key.clone(),
            pattern: build_regex(&spec.name, pattern)?,
        }),
        Condition::AccountMatches { pattern } => {
            Box::new(AccountMatches(build_regex(&spec.name, pattern)?))
        }
        Condition::Always => Box::new(Always),
    };
    Ok(predicate)
}

fn compile_action(spec: &RuleSpec) -> Result<Decision, CleanerError> {
    match spec.action {
        ActionKind::Keep => Ok(Decision::Keep),
        ActionKind::Remove => Ok(Decision::Remove),
        ActionKind::Anonymize => {
            if spec.fields.is_empty() {
                return Err(CleanerError::RuleCompilation(
                    spec.name.clone(),
                    "anonymize action requires at least one field".to_string(),
                ));
            }
            let style = match spec.mask {
                MaskKind::Hash => MaskStyle::Hash,
                MaskKind::Redact => {
                    if spec.fields.iter().any(|f| f == ACCOUNT_ID_FIELD) {
                        return Err(CleanerError::RuleCompilation(
                            spec.name.clone(),
                            "account_id can only be masked with `hash`".to_string(),
                        ));
                    }
                    let replacement = spec.replace_with.trim();
                    if replacement.is_empty() {
                        return Err(CleanerError::RuleCompilation(
                            spec.name.clone(),
                            "`replace_with` must not be blank".to_string(),
                        ));
                    }
                    if replacement.contains(['\n', '\r']) {
                        return Err(CleanerError::RuleCompilation(
                            spec.name.clone(),
                            "`replace_with` must fit on one line".to_string(),
                        ));
                    }
                    MaskStyle::Redact(replacement.to_string())
                }
            };
            Ok(Decision::Anonymize {
                fields: spec.fields.clone(),
                style,
            })
        }
    }
}

/// Compiles specs into a `RuleSet`, preserving order. Rules with
/// `enabled: false` are skipped.
pub fn compile_rules(specs: &[RuleSpec]) -> Result<RuleSet, CleanerError> {
    debug!("Starting compilation of {} rules.", specs.len());

    let mut rule_names = HashSet::new();
    let mut compiled = RuleSet::default();
    let mut compilation_errors = Vec::new();

    for spec in specs {
        if spec.name.trim().is_empty() {
            compilation_errors.push(CleanerError::RuleCompilation(
                String::new(),
                "a rule has an empty `name` field".to_string(),
            ));
            continue;
        }
        if !rule_names.insert(spec.name.as_str()) {
            compilation_errors.push(CleanerError::RuleCompilation(
                spec.name.clone(),
                "duplicate rule name".to_string(),
            ));
            continue;
        }

        let predicate = compile_predicate(spec);
        let action = compile_action(spec);
        match (predicate, action) {
            (Ok(predicate), Ok(action)) => {
                if spec.enabled == Some(false) {
                    debug!("Rule '{}' is disabled, skipping.", spec.name);
                    continue;
                }
                log::debug!(
                    target: "acctclean_core::rules",
                    "Rule '{}' compiled successfully.",
                    &spec.name
                );
                compiled.push(Rule {
                    name: spec.name.clone(),
                    predicate,
                    action,
                });
            }
            (predicate, action) => {
                compilation_errors.extend(predicate.err());
                compilation_errors.extend(action.err());
            }
        }
    }

    if !compilation_errors.is_empty() {
        let error_message = compilation_errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<String>>()
            .join("\n");
        Err(CleanerError::Fatal(format!(
            "Failed to compile {} rule(s):\n{}",
            compilation_errors.len(),
            error_message
        )))
    } else {
        debug!("Finished compiling rules. Total compiled: {}.", compiled.len());
        Ok(compiled)
    }
}
