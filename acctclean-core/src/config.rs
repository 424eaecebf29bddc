//! Configuration management for `acctclean-core`.
//!
//! This module defines the serializable rule specifications and the top-level
//! cleaner configuration. It handles YAML loading, merging user rules over the
//! embedded defaults, and enable/disable filtering. Rule specs are plain data;
//! turning them into runtime rules is the job of [`crate::rules::compiler`].
//!
//! License: MIT OR Apache-2.0

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::parser::LogFormat;
use crate::record::EventType;
use crate::rules::compiler::compile_rules;
use crate::rules::ContextSettings;

pub const DEFAULT_REPLACEMENT: &str = "[REDACTED]";

/// When a rule applies.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// Record age strictly greater than `days`.
    OlderThan {
        days: i64,
        /// Measure age from this attribute instead of the record timestamp.
        timestamp_field: Option<String>,
    },
    AccountClosed,
    SupersededDuplicate,
    EventType { types: Vec<String> },
    AttributeMatches { key: String, pattern: String },
    AccountMatches { pattern: String },
    #[default]
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    #[default]
    Keep,
    Remove,
    Anonymize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskKind {
    #[default]
    Hash,
    Redact,
}

/// A single retention rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuleSpec {
    /// Unique identifier for the rule (e.g., "expire-old-records").
    pub name: String,
    pub description: Option<String>,
    pub when: Condition,
    pub action: ActionKind,
    /// Fields masked by `anonymize`: attribute keys or `account_id`.
    pub fields: Vec<String>,
    pub mask: MaskKind,
    /// Replacement text for `redact` masking.
    pub replace_with: String,
    /// Explicit override for enabling/disabling the rule.
    pub enabled: Option<bool>,
    /// If true, the rule is dropped unless explicitly enabled.
    pub opt_in: bool,
}

impl Default for RuleSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            when: Condition::Always,
            action: ActionKind::Keep,
            fields: Vec::new(),
            mask: MaskKind::Hash,
            replace_with: DEFAULT_REPLACEMENT.to_string(),
            enabled: None,
            opt_in: false,
        }
    }
}

/// Top-level configuration: ordered rules plus context and format settings.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// Rules in priority order.
    pub rules: Vec<RuleSpec>,
    /// Accounts treated as closed regardless of log content.
    pub closed_accounts: Vec<String>,
    /// Event types that close an account. Defaults to `close` and `delete`.
    pub closing_events: Option<Vec<String>>,
    pub format: Option<LogFormat>,
}

impl CleanerConfig {
    /// Loads rules from a YAML file and validates that they compile.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading retention rules from: {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: CleanerConfig = serde_yml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        compile_rules(&config.rules)
            .with_context(|| format!("Invalid rules in config file {}", path.display()))?;
        info!("Loaded {} rules from file {}.", config.rules.len(), path.display());

        Ok(config)
    }

    /// Loads the built-in rule set.
    pub fn load_default_rules() -> Result<Self> {
        debug!("Loading default rules from embedded string...");
        let default_yaml = include_str!("../config/default_rules.yaml");
        let config: CleanerConfig =
            serde_yml::from_str(default_yaml).context("Failed to parse default rules")?;

        debug!("Loaded {} default rules.", config.rules.len());
        Ok(config)
    }

    pub fn log_format(&self) -> LogFormat {
        self.format.clone().unwrap_or_default()
    }

    pub fn context_settings(&self) -> ContextSettings {
        let defaults = ContextSettings::default();
        ContextSettings {
            closed_accounts: self.closed_accounts.clone(),
            closing_events: match &self.closing_events {
                Some(kinds) => kinds.iter().map(|k| EventType::parse(k)).collect(),
                None => defaults.closing_events,
            },
        }
    }

    /// Drops disabled rules, and opt-in rules that were not enabled.
    pub fn set_active_rules(&mut self, enable_rules: &[String], disable_rules: &[String]) {
        let enable_set: HashSet<&str> = enable_rules.iter().map(String::as_str).collect();
        let disable_set: HashSet<&str> = disable_rules.iter().map(String::as_str).collect();

        debug!("Initial rules count before filtering: {}", self.rules.len());

        let all_rule_names: HashSet<&str> = self.rules.iter().map(|r| r.name.as_str()).collect();

        for rule_name in enable_set.difference(&all_rule_names) {
            warn!("Rule '{}' in `enable_rules` list does not exist.", rule_name);
        }

        for rule_name in disable_set.difference(&all_rule_names) {
            warn!("Rule '{}' in `disable_rules` list does not exist.", rule_name);
        }

        self.rules.retain(|rule| {
            let name = rule.name.as_str();
            if disable_set.contains(name) {
                return false;
            }
            if enable_set.contains(name) {
                return true;
            }
            rule.enabled != Some(false) && !rule.opt_in
        });
        for rule in &mut self.rules {
            if enable_set.contains(rule.name.as_str()) {
                rule.enabled = Some(true);
            }
        }

        debug!("Final active rules count after filtering: {}", self.rules.len());
    }
}

/// Merges a user configuration over the defaults.
///
/// A user rule with the same name as a default replaces it in place, keeping the
/// default's priority; other user rules are appended in their file order.
pub fn merge_rules(default_config: CleanerConfig, user_config: Option<CleanerConfig>) -> CleanerConfig {
    debug!("merge_rules called. Initial default rules count: {}", default_config.rules.len());

    let Some(user_cfg) = user_config else {
        return default_config;
    };
    debug!("User config provided. Merging {} user rules.", user_cfg.rules.len());

    let mut rules = default_config.rules;
    for user_rule in user_cfg.rules {
        match rules.iter_mut().find(|r| r.name == user_rule.name) {
            Some(existing) => *existing = user_rule,
            None => rules.push(user_rule),
        }
    }

    let mut closed_accounts = default_config.closed_accounts;
    for account in user_cfg.closed_accounts {
        if !closed_accounts.contains(&account) {
            closed_accounts.push(account);
        }
    }

    let merged = CleanerConfig {
        rules,
        closed_accounts,
        closing_events: user_cfg.closing_events.or(default_config.closing_events),
        format: user_cfg.format.or(default_config.format),
    };
    debug!("Final total rules after merge: {}", merged.rules.len());
    merged
}
