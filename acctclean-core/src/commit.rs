// acctclean-core/src/commit.rs
//! Backup and atomic replacement of a cleaned log.
//!
//! Order of operations, each step aborting everything after it:
//!
//! 1. copy the original to a timestamped backup next to it;
//! 2. write the cleaned content to a temporary file in the same directory;
//! 3. check the staged file's size and line count against what was rendered;
//! 4. rename the staged file over the original.
//!
//! The original is never opened for writing. Until step 4 completes it is
//! byte-identical to what was read, and the rename is the only point where it
//! changes. If anything fails the staged file is discarded and the backup stays
//! on disk for inspection.
//!
//! The input file is assumed not to be written by anyone else during a run.
//! No locking is attempted.

use chrono::Utc;
use log::{debug, info, warn};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::errors::CleanerError;
use crate::record::LineEnding;

const BACKUP_SUFFIX: &str = "bak";
const STAGE_SUFFIX: &str = ".tmp";

/// Forces a commit to fail at a given step. Used for recovery drills and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// After the backup exists, before anything is staged.
    AfterBackup,
    /// After the staged file is written, before it is verified.
    AfterStage,
    /// After verification, instead of renaming.
    BeforeRename,
}

/// One line of the cleaned log, with the terminator it had in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub content: Vec<u8>,
    pub ending: LineEnding,
}

/// The lines that make up the cleaned log, in output order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanedOutput {
    pub lines: Vec<OutputLine>,
}

impl CleanedOutput {
    pub fn push(&mut self, content: impl Into<Vec<u8>>, ending: LineEnding) {
        self.lines.push(OutputLine {
            content: content.into(),
            ending,
        });
    }

    /// File content: every line followed by its own terminator.
    pub fn render(&self) -> Vec<u8> {
        let capacity = self.lines.iter().map(|l| l.content.len() + 2).sum();
        let mut out = Vec::with_capacity(capacity);
        for line in &self.lines {
            out.extend_from_slice(&line.content);
            out.extend_from_slice(line.ending.as_str().as_bytes());
        }
        out
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// The pre-mutation copy of a committed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    pub path: PathBuf,
    /// False when the backup was deleted after a verified commit.
    pub retained: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOptions {
    pub retain_backup: bool,
    pub fail_point: Option<FailPoint>,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            retain_backup: true,
            fail_point: None,
        }
    }
}

/// Backs up `input`, then atomically replaces it with `output`.
pub fn commit(
    input: &Path,
    output: &CleanedOutput,
    options: &CommitOptions,
) -> Result<BackupHandle, CleanerError> {
    let backup = create_backup(input)?;
    debug!("Backup of {} written to {}", input.display(), backup.display());

    let commit_error = |reason: String| CleanerError::Commit {
        input: input.to_path_buf(),
        backup: backup.clone(),
        reason,
    };

    if options.fail_point == Some(FailPoint::AfterBackup) {
        return Err(commit_error("injected failure after backup".to_string()));
    }

    let content = output.render();
    let staged = stage(input, &content).map_err(|e| commit_error(format!("staging failed: {}", e)))?;
    debug!("Staged cleaned output at {}", staged.path().display());

    if options.fail_point == Some(FailPoint::AfterStage) {
        return Err(commit_error("injected failure after staging".to_string()));
    }

    verify_staged(staged.path(), content.len() as u64, output.line_count()).map_err(commit_error)?;

    if options.fail_point == Some(FailPoint::BeforeRename) {
        return Err(CleanerError::Rename {
            input: input.to_path_buf(),
            backup,
            source: io::Error::other("injected failure before rename"),
        });
    }

    // Point of no return.
    staged.persist(input).map_err(|e| CleanerError::Rename {
        input: input.to_path_buf(),
        backup: backup.clone(),
        source: e.error,
    })?;
    info!(
        "Committed {} line(s) to {} (backup: {})",
        output.line_count(),
        input.display(),
        backup.display()
    );

    let mut retained = true;
    if !options.retain_backup {
        match fs::remove_file(&backup) {
            Ok(()) => {
                debug!("Removed backup {}", backup.display());
                retained = false;
            }
            Err(e) => warn!("Could not remove backup {}: {}", backup.display(), e),
        }
    }

    Ok(BackupHandle {
        path: backup,
        retained,
    })
}

fn parent_dir(input: &Path) -> &Path {
    match input.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn file_name(input: &Path) -> String {
    input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string())
}

/// `<name>.<UTC timestamp>.bak`, with a counter if that name is taken.
fn backup_path(input: &Path) -> PathBuf {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let base = format!("{}.{}", file_name(input), stamp);
    let dir = parent_dir(input);
    let mut candidate = dir.join(format!("{}.{}", base, BACKUP_SUFFIX));
    let mut counter = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{}-{}.{}", base, counter, BACKUP_SUFFIX));
        counter += 1;
    }
    candidate
}

fn create_backup(input: &Path) -> Result<PathBuf, CleanerError> {
    let backup_error = |source: io::Error| CleanerError::Backup {
        input: input.to_path_buf(),
        source,
    };
    let expected = fs::metadata(input).map_err(backup_error)?.len();
    let backup = backup_path(input);
    let copied = fs::copy(input, &backup).map_err(backup_error)?;
    if copied != expected {
        let _ = fs::remove_file(&backup);
        return Err(backup_error(io::Error::other(format!(
            "backup copied {} bytes, expected {}",
            copied, expected
        ))));
    }
    Ok(backup)
}

fn stage(input: &Path, content: &[u8]) -> io::Result<tempfile::NamedTempFile> {
    let mut staged = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name(input)))
        .suffix(STAGE_SUFFIX)
        .tempfile_in(parent_dir(input))?;
    staged.write_all(content)?;
    staged.flush()?;
    staged.as_file().sync_all()?;
    let permissions = fs::metadata(input)?.permissions();
    fs::set_permissions(staged.path(), permissions)?;
    Ok(staged)
}

fn verify_staged(path: &Path, expected_bytes: u64, expected_lines: usize) -> Result<(), String> {
    let actual_bytes = fs::metadata(path)
        .map_err(|e| format!("cannot stat staged file: {}", e))?
        .len();
    if actual_bytes != expected_bytes {
        return Err(format!(
            "staged file is {} bytes, expected {}",
            actual_bytes, expected_bytes
        ));
    }
    let staged = fs::read(path).map_err(|e| format!("cannot re-read staged file: {}", e))?;
    let actual_lines = staged.iter().filter(|b| **b == b'\n').count();
    if actual_lines != expected_lines {
        return Err(format!(
            "staged file has {} lines, expected {}",
            actual_lines, expected_lines
        ));
    }
    Ok(())
}
