// acctclean-core/src/lib.rs
//! # acctclean Core Library
//!
//! `acctclean-core` cleans account activity logs in place. Each line of a log
//! is parsed into a record, classified by an ordered set of retention rules
//! (keep, remove or anonymize), and the surviving lines are written back in
//! their original order. The original file is backed up first and replaced
//! atomically, so a failed run never leaves a partially cleaned log behind.
//!
//! ## Modules
//!
//! * `record`: The parsed record, raw line and malformed-line types.
//! * `parser`: Splits file content into lines and lines into records.
//! * `rules`: The `Predicate` trait, ordered `RuleSet`, run-wide `RuleContext`
//!   and the built-in predicates.
//! * `config`: YAML rule specifications, the embedded defaults and merging.
//! * `mask`: Field masking for anonymized records and PII-safe log output.
//! * `report`: The per-run `CleaningReport`.
//! * `commit`: Backup, staging, verification and atomic rename.
//! * `orchestrator`: The `Cleaner`, which runs one file end to end.
//! * `batch`: Directory discovery and bounded concurrent runs over many files.
//! * `errors`: The `CleanerError` type.
//!
//! ## Usage Example
//!
//! ```rust
//! use acctclean_core::{CleanOptions, Cleaner, CleanerConfig};
//! use chrono::{TimeZone, Utc};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     // 1. Load the built-in rules and drop the opt-in ones.
//!     let mut config = CleanerConfig::load_default_rules()?;
//!     config.set_active_rules(&[], &[]);
//!
//!     // 2. Pin "now" so age rules are reproducible.
//!     let options = CleanOptions {
//!         time_reference: Some(Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap()),
//!         ..CleanOptions::default()
//!     };
//!     let cleaner = Cleaner::from_config(&config, options)?;
//!
//!     // 3. Classify some content without touching the filesystem.
//!     let input = "2023-01-01,acct1,login\n2020-01-01,acct1,login\nnot a record\n";
//!     let (report, output) = cleaner
//!         .clean_content(Path::new("accounts.log"), input.as_bytes())
//!         .map_err(|(e, _)| e)?;
//!
//!     assert_eq!((report.kept, report.removed, report.malformed), (1, 1, 1));
//!     assert_eq!(output.render(), b"2023-01-01,acct1,login\n");
//!     Ok(())
//! }
//! ```
//!
//! License: MIT OR Apache-2.0

pub mod batch;
pub mod commit;
pub mod config;
pub mod errors;
pub mod mask;
pub mod orchestrator;
pub mod parser;
pub mod record;
pub mod report;
pub mod rules;

/// Re-exports the configuration types and functions for managing retention rules.
pub use config::{merge_rules, ActionKind, CleanerConfig, Condition, MaskKind, RuleSpec};

/// Re-exports the custom error type for clear error reporting.
pub use errors::CleanerError;

pub use record::{EventType, LineEnding, MalformedRecord, ParseOutcome, RawLine, Record};
pub use parser::{parse_line, parse_lines, split_raw_lines, LogFormat};

/// Re-exports the rule engine: the capability trait, rules and their context.
pub use rules::compiler::{compile_rules, MAX_PATTERN_LENGTH};
pub use rules::{Classification, ContextSettings, Decision, Predicate, Rule, RuleContext, RuleSet};

pub use mask::{loggable_account, pseudonymize, redact_sensitive, MaskStyle};
pub use report::CleaningReport;
pub use commit::{commit, BackupHandle, CleanedOutput, CommitOptions, FailPoint, OutputLine};
pub use orchestrator::{CleanOptions, Cleaner, RunOutcome};

/// Re-exports the multi-file runner.
pub use batch::{clean_all, discover_logs, FileOutcome, DEFAULT_FILE_PATTERN, DEFAULT_MAX_WORKERS};
