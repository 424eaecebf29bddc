// acctclean-core/src/batch.rs
//! Cleaning several logs in one invocation.
//!
//! Each file is an independent run with no state shared with the others beyond
//! the read-only `Cleaner`. Runs execute on the blocking thread pool, bounded
//! by a semaphore, and one file failing never stops the rest.

use anyhow::{Context, Result};
use log::{debug, info};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::errors::CleanerError;
use crate::orchestrator::{Cleaner, RunOutcome};

/// File names picked up from a directory when no pattern is given.
pub const DEFAULT_FILE_PATTERN: &str = r".*\.(log|txt)$";

pub const DEFAULT_MAX_WORKERS: usize = 4;

/// The outcome of one file in a batch.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub outcome: RunOutcome,
}

/// Regular files in `dir` whose name matches `pattern`, sorted by path.
pub fn discover_logs(dir: &Path, pattern: &Regex) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to list input directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if pattern.is_match(&name.to_string_lossy()) {
            files.push(path);
        } else {
            debug!("Skipping {} (does not match {})", path.display(), pattern.as_str());
        }
    }
    files.sort();
    info!("Found {} log file(s) in {}", files.len(), dir.display());
    Ok(files)
}

/// Cleans every path with at most `max_workers` runs in flight.
///
/// Outcomes are returned in the order of `paths`.
pub async fn clean_all(cleaner: Arc<Cleaner>, paths: Vec<PathBuf>, max_workers: usize) -> Vec<FileOutcome> {
    let permits = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut pending = Vec::with_capacity(paths.len());

    for path in paths {
        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                pending.push((path, Err(e.to_string())));
                continue;
            }
        };
        let cleaner = Arc::clone(&cleaner);
        let task_path = path.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            cleaner.run(&task_path)
        });
        pending.push((path, Ok(handle)));
    }

    let mut outcomes = Vec::with_capacity(pending.len());
    for (path, task) in pending {
        let outcome = match task {
            Ok(handle) => match handle.await {
                Ok(outcome) => outcome,
                Err(e) => RunOutcome::FatalIo {
                    error: CleanerError::Fatal(format!("worker for {} failed: {}", path.display(), e)),
                },
            },
            Err(reason) => RunOutcome::FatalIo {
                error: CleanerError::Fatal(format!("could not schedule {}: {}", path.display(), reason)),
            },
        };
        outcomes.push(FileOutcome { path, outcome });
    }
    outcomes
}
