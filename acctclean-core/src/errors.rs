//! errors.rs - Custom error types for the acctclean-core library.
//!
//! This module defines a structured error enum for the engine. Per-line parse
//! failures are not errors here: they become `MalformedRecord` diagnostics and
//! the run continues. Every variant below ends the run for the file it occurred in.
//!
//! License: MIT OR APACHE 2.0

use std::path::PathBuf;
use thiserror::Error;

/// All run-level failures surfaced by the `acctclean-core` library.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CleanerError {
    #[error("Rule '{rule}' failed on line {line}: {reason}")]
    RuleEvaluation {
        rule: String,
        line: usize,
        reason: String,
    },

    #[error("Failed to create backup of {}: {source}", .input.display())]
    Backup {
        input: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stage cleaned output for {} (original untouched, backup at {}): {reason}", .input.display(), .backup.display())]
    Commit {
        input: PathBuf,
        backup: PathBuf,
        reason: String,
    },

    #[error("Failed to replace {} with cleaned output (original untouched, backup at {}): {source}", .input.display(), .backup.display())]
    Rename {
        input: PathBuf,
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read input file {}: {source}", .input.display())]
    Read {
        input: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to compile retention rule '{0}': {1}")]
    RuleCompilation(String, String),

    #[error("A fatal error occurred: {0}")]
    Fatal(String),
}

impl CleanerError {
    /// The backup left behind by a failed commit, if the failure happened after step (a).
    pub fn backup_path(&self) -> Option<&PathBuf> {
        match self {
            CleanerError::Commit { backup, .. } | CleanerError::Rename { backup, .. } => Some(backup),
            _ => None,
        }
    }
}
