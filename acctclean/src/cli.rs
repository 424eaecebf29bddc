// acctclean/src/cli.rs
//! This file defines the command-line interface (CLI) for the acctclean application,
//! including all available commands and their arguments. Every option of `clean`
//! can also be supplied through an `ACCTCLEAN_*` environment variable (or a `.env`
//! file in the working directory).
//! License: MIT OR Apache-2.0

use acctclean_core::parser::parse_timestamp;
use acctclean_core::{FailPoint, DEFAULT_FILE_PATTERN, DEFAULT_MAX_WORKERS};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "acctclean",
    author = "Relay",
    version = env!("CARGO_PKG_VERSION"),
    about = "Clean account activity logs in place under retention rules",
    long_about = "acctclean removes expired, closed-account and duplicate records from account activity logs and masks sensitive fields, according to an ordered set of retention rules. The original log is backed up before it is replaced, and it is only ever replaced by an atomic rename of a fully written and verified file.",
    arg_required_else_help = true,
)]
pub struct Cli {
    /// Disable informational messages
    #[arg(long, short = 'q', global = true, help = "Suppress all informational and debug messages.")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, short = 'd', global = true, conflicts_with = "quiet", help = "Enable debug logging.")]
    pub debug: bool,

    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// All available commands for the `acctclean` CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cleans a log file, or every matching log in a directory.
    #[command(about = "Clean a log file, or every matching log file in a directory.")]
    Clean(CleanCommand),

    /// Lists the rules that would be applied, in priority order.
    #[command(about = "List the active retention rules in the order they are evaluated.")]
    Rules(RulesCommand),
}

/// Options that decide which rules are active.
#[derive(Args, Debug, Clone, Default)]
pub struct RuleSelection {
    /// Path to a custom rule configuration file (YAML).
    #[arg(long = "config", value_name = "FILE", env = "ACCTCLEAN_CONFIG", help = "Path to a rule configuration file (YAML), merged over the built-in rules.")]
    pub config: Option<PathBuf>,

    /// Ignore the built-in rules.
    #[arg(long = "no-default-rules", help = "Start from an empty rule set instead of the built-in rules.")]
    pub no_default_rules: bool,

    /// Enable these rule names, including opt-in rules (comma-separated).
    #[arg(long, short = 'e', value_delimiter = ',', help = "Enable these rule names, including opt-in rules (comma-separated).")]
    pub enable: Vec<String>,

    /// Disable these rule names (comma-separated).
    #[arg(long, short = 'x', value_delimiter = ',', help = "Disable these rule names (comma-separated).")]
    pub disable: Vec<String>,
}

/// Arguments for the `clean` command.
#[derive(Args, Debug)]
pub struct CleanCommand {
    /// Log file or directory of log files.
    #[arg(value_name = "PATH", env = "ACCTCLEAN_INPUT", help = "Log file to clean, or a directory whose matching files are cleaned.")]
    pub input: PathBuf,

    #[command(flatten)]
    pub rules: RuleSelection,

    /// Report what would change without modifying any file.
    #[arg(long = "dry-run", env = "ACCTCLEAN_DRY_RUN", help = "Report what would change without modifying any file.")]
    pub dry_run: bool,

    /// Keep the backup after a successful commit.
    #[arg(long = "retain-backup", value_name = "BOOL", env = "ACCTCLEAN_RETAIN_BACKUP", default_value_t = true, action = ArgAction::Set, help = "Keep the backup after a successful commit.")]
    pub retain_backup: bool,

    /// Shorthand for `--retain-backup false`.
    #[arg(long = "discard-backup", help = "Delete the backup once the cleaned log has been committed.")]
    pub discard_backup: bool,

    /// Keep malformed lines in the cleaned output.
    #[arg(long = "retain-malformed", help = "Keep lines that cannot be parsed in the cleaned output instead of dropping them.")]
    pub retain_malformed: bool,

    /// Fixed "now" for age rules.
    #[arg(long = "time-reference", value_name = "TIME", env = "ACCTCLEAN_TIME_REFERENCE", value_parser = parse_time_reference, help = "Use this time as \"now\" for age rules (RFC 3339 or YYYY-MM-DD).")]
    pub time_reference: Option<DateTime<Utc>>,

    /// File name pattern for directory inputs.
    #[arg(long = "pattern", value_name = "REGEX", env = "ACCTCLEAN_FILE_PATTERN", default_value = DEFAULT_FILE_PATTERN, help = "Regex that file names must match when PATH is a directory.")]
    pub pattern: String,

    /// Maximum number of files cleaned at once.
    #[arg(long = "max-workers", value_name = "N", env = "ACCTCLEAN_MAX_WORKERS", default_value_t = DEFAULT_MAX_WORKERS, value_parser = parse_worker_count, help = "Maximum number of files cleaned concurrently.")]
    pub max_workers: usize,

    /// Print the reports as JSON instead of a table.
    #[arg(long = "json", help = "Print the cleaning reports to stdout as JSON.")]
    pub json: bool,

    /// Forces the commit to fail at the given step.
    #[arg(long = "fail-point", value_name = "STEP", env = "ACCTCLEAN_FAILPOINT", value_enum, hide = true)]
    pub fail_point: Option<FailPointArg>,
}

impl CleanCommand {
    pub fn keeps_backup(&self) -> bool {
        self.retain_backup && !self.discard_backup
    }
}

/// Arguments for the `rules` command.
#[derive(Args, Debug)]
pub struct RulesCommand {
    #[command(flatten)]
    pub rules: RuleSelection,

    /// Print the rules as JSON instead of a table.
    #[arg(long = "json", help = "Print the active rules to stdout as JSON.")]
    pub json: bool,
}

/// Steps at which a commit can be made to fail for recovery drills.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FailPointArg {
    #[value(name = "after_backup")]
    AfterBackup,
    #[value(name = "after_stage")]
    AfterStage,
    #[value(name = "before_rename")]
    BeforeRename,
}

impl From<FailPointArg> for FailPoint {
    fn from(arg: FailPointArg) -> Self {
        match arg {
            FailPointArg::AfterBackup => FailPoint::AfterBackup,
            FailPointArg::AfterStage => FailPoint::AfterStage,
            FailPointArg::BeforeRename => FailPoint::BeforeRename,
        }
    }
}

fn parse_time_reference(s: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(s).ok_or_else(|| format!("'{}' is not an RFC 3339 timestamp or YYYY-MM-DD date", s))
}

fn parse_worker_count(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_clean_defaults() {
        let cli = Cli::try_parse_from(["acctclean", "clean", "accounts.log"]).unwrap();
        let Commands::Clean(cmd) = cli.command else {
            panic!("expected clean command");
        };
        assert_eq!(cmd.input, PathBuf::from("accounts.log"));
        assert!(cmd.keeps_backup());
        assert!(!cmd.dry_run);
        assert_eq!(cmd.max_workers, DEFAULT_MAX_WORKERS);
        assert_eq!(cmd.pattern, DEFAULT_FILE_PATTERN);
        assert!(cmd.fail_point.is_none());
    }

    #[test]
    fn test_clean_flags() {
        let cli = Cli::try_parse_from([
            "acctclean",
            "clean",
            "logs",
            "--discard-backup",
            "--enable",
            "collapse-duplicates,mask-identity-numbers",
            "--time-reference",
            "2023-06-01",
            "--fail-point",
            "before_rename",
        ])
        .unwrap();
        let Commands::Clean(cmd) = cli.command else {
            panic!("expected clean command");
        };
        assert!(!cmd.keeps_backup());
        assert_eq!(cmd.rules.enable, vec!["collapse-duplicates", "mask-identity-numbers"]);
        assert_eq!(cmd.time_reference.unwrap().to_rfc3339(), "2023-06-01T00:00:00+00:00");
        assert_eq!(cmd.fail_point.map(FailPoint::from), Some(FailPoint::BeforeRename));
    }

    #[test]
    fn test_rejects_zero_workers_and_bad_time() {
        assert!(Cli::try_parse_from(["acctclean", "clean", "x", "--max-workers", "0"]).is_err());
        assert!(Cli::try_parse_from(["acctclean", "clean", "x", "--time-reference", "soon"]).is_err());
    }
}
