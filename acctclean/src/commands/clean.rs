// acctclean/src/commands/clean.rs
//! `acctclean clean`: runs the cleaner over one file or a directory of logs.

use acctclean_core::{clean_all, discover_logs, CleanOptions, Cleaner, FileOutcome, RunOutcome};
use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use log::{debug, info};
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;

use super::{build_config, EXIT_ABORTED, EXIT_FATAL_IO, EXIT_OK};
use crate::cli::CleanCommand;
use crate::ui::{output_format, summary};

/// Runs the command and returns the process exit code.
///
/// Configuration problems are returned as errors. Per-file failures are
/// reported and reflected in the exit code but never stop the other files.
pub async fn run_clean(cmd: CleanCommand, quiet: bool) -> Result<u8> {
    info!("Starting acctclean clean on {}.", cmd.input.display());

    let config = build_config(&cmd.rules)?;
    let options = CleanOptions {
        dry_run: cmd.dry_run,
        retain_backup: cmd.keeps_backup(),
        time_reference: cmd.time_reference,
        retain_malformed: cmd.retain_malformed,
        fail_point: cmd.fail_point.map(Into::into),
    };
    let cleaner = Cleaner::from_config(&config, options).context("Failed to compile retention rules")?;
    let stderr_supports_color = io::stderr().is_terminal();
    if cleaner.rules().is_empty() && !quiet {
        output_format::print_warn_message(
            &mut io::stderr(),
            "No retention rules are active; every well-formed record will be kept.",
            stderr_supports_color,
        )?;
    }
    debug!("{} rule(s) active.", cleaner.rules().len());

    let paths = if cmd.input.is_dir() {
        let pattern = Regex::new(&cmd.pattern)
            .with_context(|| format!("Invalid file name pattern '{}'", cmd.pattern))?;
        let paths = discover_logs(&cmd.input, &pattern)?;
        if paths.is_empty() && !quiet {
            output_format::print_warn_message(
                &mut io::stderr(),
                &format!("No files in {} match '{}'; nothing to clean.", cmd.input.display(), cmd.pattern),
                stderr_supports_color,
            )?;
        } else if !quiet && !cmd.json {
            output_format::print_info_message(
                &mut io::stderr(),
                &format!("Found {} log(s) in {} matching '{}'.", paths.len(), cmd.input.display(), cmd.pattern),
                stderr_supports_color,
            )?;
        }
        paths
    } else {
        vec![cmd.input.clone()]
    };

    let outcomes = clean_all(Arc::new(cleaner), paths, cmd.max_workers).await;

    report_failures(&outcomes, stderr_supports_color);
    if cmd.json {
        let document = summary::outcomes_to_json(&outcomes, cmd.dry_run);
        let stdout = io::stdout();
        let mut writer = stdout.lock();
        serde_json::to_writer_pretty(&mut writer, &document)?;
        writeln!(writer)?;
    } else if !quiet {
        let stdout = io::stdout();
        let supports_color = stdout.is_terminal();
        summary::print_run_summary(&outcomes, cmd.dry_run, &mut stdout.lock(), supports_color)?;
    }

    let code = exit_code(&outcomes);
    info!("acctclean clean finished with exit code {}.", code);
    Ok(code)
}

fn report_failures(outcomes: &[FileOutcome], stderr_supports_color: bool) {
    for file in outcomes {
        let message = match &file.outcome {
            RunOutcome::Success { .. } => continue,
            RunOutcome::Aborted { error, .. } => match error.backup_path() {
                Some(backup) => format!(
                    "{}: {} (original untouched, backup kept at {})",
                    file.path.display(),
                    error,
                    backup.display()
                ),
                None => format!("{}: {} (original untouched)", file.path.display(), error),
            },
            RunOutcome::FatalIo { error } => format!("{}: {}", file.path.display(), error),
        };
        let _ = output_format::print_error_message(&mut io::stderr(), &message, stderr_supports_color);
    }
}

/// The most severe outcome across all files decides the exit code.
pub fn exit_code(outcomes: &[FileOutcome]) -> u8 {
    outcomes
        .iter()
        .map(|file| match file.outcome {
            RunOutcome::Success { .. } => EXIT_OK,
            RunOutcome::Aborted { .. } => EXIT_ABORTED,
            RunOutcome::FatalIo { .. } => EXIT_FATAL_IO,
        })
        .max()
        .unwrap_or(EXIT_OK)
}
