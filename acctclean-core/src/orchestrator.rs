// acctclean-core/src/orchestrator.rs
//! Cleaning orchestrator.
//!
//! Drives one run over one file: read, parse everything, build the rule context
//! from every parsed record, classify every record, assemble the surviving lines
//! in their original order, and hand them to [`crate::commit`]. Dry runs stop
//! before the commit but produce the same report.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::fs;
use std::path::Path;

use crate::commit::{commit, BackupHandle, CleanedOutput, CommitOptions, FailPoint};
use crate::config::CleanerConfig;
use crate::errors::CleanerError;
use crate::mask::mask_record;
use crate::parser::{parse_lines, split_raw_lines, LogFormat};
use crate::record::{ParseOutcome, RawLine, Record};
use crate::report::CleaningReport;
use crate::rules::compiler::compile_rules;
use crate::rules::{ContextSettings, Decision, RuleContext, RuleSet};

/// Per-run switches supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanOptions {
    /// Compute the report without touching any file.
    pub dry_run: bool,
    /// Keep the backup after a successful commit.
    pub retain_backup: bool,
    /// Overrides "now" for age rules. Captured once per run when absent.
    pub time_reference: Option<DateTime<Utc>>,
    /// Re-emit malformed lines in place instead of dropping them from the output.
    pub retain_malformed: bool,
    pub fail_point: Option<FailPoint>,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            retain_backup: true,
            time_reference: None,
            retain_malformed: false,
            fail_point: None,
        }
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// `backup` is `None` for dry runs and for logs that needed no change.
    Success {
        report: CleaningReport,
        backup: Option<BackupHandle>,
    },
    /// A rule or the commit failed. The original file is untouched.
    Aborted {
        error: CleanerError,
        report: CleaningReport,
    },
    /// The input could not be read; nothing was classified.
    FatalIo { error: CleanerError },
}

impl RunOutcome {
    pub fn report(&self) -> Option<&CleaningReport> {
        match self {
            RunOutcome::Success { report, .. } | RunOutcome::Aborted { report, .. } => Some(report),
            RunOutcome::FatalIo { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success { .. })
    }
}

enum Slot<'a> {
    Record(Record, &'a RawLine),
    Malformed(&'a RawLine),
}

/// A configured cleaning engine. Immutable and shareable across runs.
#[derive(Debug)]
pub struct Cleaner {
    rules: RuleSet,
    settings: ContextSettings,
    format: LogFormat,
    options: CleanOptions,
}

impl Cleaner {
    pub fn new(rules: RuleSet, settings: ContextSettings, format: LogFormat, options: CleanOptions) -> Self {
        Self {
            rules,
            settings,
            format,
            options,
        }
    }

    /// Compiles the configuration's rules and captures its context and format settings.
    pub fn from_config(config: &CleanerConfig, options: CleanOptions) -> Result<Self, CleanerError> {
        Ok(Self::new(
            compile_rules(&config.rules)?,
            config.context_settings(),
            config.log_format(),
            options,
        ))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn options(&self) -> &CleanOptions {
        &self.options
    }

    /// Cleans `input` in place (or only reports, for dry runs).
    pub fn run(&self, input: &Path) -> RunOutcome {
        info!("Cleaning {}{}", input.display(), if self.options.dry_run { " [DRY RUN]" } else { "" });

        let content = match fs::read(input) {
            Ok(c) => c,
            Err(source) => {
                return RunOutcome::FatalIo {
                    error: CleanerError::Read {
                        input: input.to_path_buf(),
                        source,
                    },
                }
            }
        };

        let (report, output) = match self.clean_content(input, &content) {
            Ok(done) => done,
            Err((error, report)) => return RunOutcome::Aborted { error, report },
        };

        info!(
            "{}: {} line(s): {} kept, {} removed, {} anonymized, {} malformed",
            input.display(),
            report.total_lines,
            report.kept,
            report.removed,
            report.anonymized,
            report.malformed
        );

        if self.options.dry_run {
            info!("[DRY RUN] Would write {} line(s) to {}", output.line_count(), input.display());
            return RunOutcome::Success { report, backup: None };
        }

        if output.render() == content {
            info!("{} is already clean, leaving it unchanged", input.display());
            return RunOutcome::Success { report, backup: None };
        }

        let commit_options = CommitOptions {
            retain_backup: self.options.retain_backup,
            fail_point: self.options.fail_point,
        };
        match commit(input, &output, &commit_options) {
            Ok(backup) => RunOutcome::Success {
                report,
                backup: Some(backup),
            },
            Err(error) => RunOutcome::Aborted { error, report },
        }
    }

    /// Parses and classifies `content` without touching the filesystem.
    ///
    /// On a rule failure the error is returned with the report as far as it got.
    pub fn clean_content(
        &self,
        source: &Path,
        content: &[u8],
    ) -> Result<(CleaningReport, CleanedOutput), (CleanerError, CleaningReport)> {
        let lines = split_raw_lines(content);
        let mut report = CleaningReport::new(source.to_path_buf(), lines.len());

        let mut slots = Vec::with_capacity(lines.len());
        for (line, outcome) in lines.iter().zip(parse_lines(&lines, &self.format)) {
            match outcome {
                ParseOutcome::Parsed(record) => slots.push(Slot::Record(record, line)),
                ParseOutcome::Malformed(malformed) => {
                    warn!(
                        "{}:{}: malformed line: {}",
                        source.display(),
                        malformed.line_number,
                        malformed.reason
                    );
                    slots.push(Slot::Malformed(line));
                    report.record_malformed(malformed);
                }
            }
        }

        let now = self.options.time_reference.unwrap_or_else(Utc::now);
        let ctx = RuleContext::build(
            slots.iter().filter_map(|slot| match slot {
                Slot::Record(record, _) => Some(record),
                Slot::Malformed(_) => None,
            }),
            now,
            &self.settings,
        );

        let mut output = CleanedOutput {
            lines: Vec::with_capacity(slots.len()),
        };
        for slot in &slots {
            match slot {
                Slot::Malformed(line) => {
                    if self.options.retain_malformed {
                        output.push(line.as_bytes(), line.ending);
                    }
                }
                Slot::Record(record, line) => {
                    let classification = match self.rules.classify(record, &ctx) {
                        Ok(c) => c,
                        Err(error) => return Err((error, report)),
                    };
                    report.record_decision(classification.decision, classification.rule);
                    match classification.decision {
                        Decision::Keep => output.push(record.raw.as_str(), line.ending),
                        Decision::Remove => {}
                        Decision::Anonymize { fields, style } => {
                            output.push(mask_record(record, fields, style), line.ending)
                        }
                    }
                }
            }
        }

        debug_assert!(report.is_balanced());
        debug!(
            "{}: {} of {} line(s) survive",
            source.display(),
            output.line_count(),
            report.total_lines
        );
        Ok((report, output))
    }
}
