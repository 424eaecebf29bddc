// acctclean/src/main.rs
//! acctclean entry point.
//!
//! Loads `.env`, parses arguments, initialises logging and dispatches to the
//! subcommand. The exit code reports the most severe per-file outcome.

use acctclean::cli::{Cli, Commands};
use acctclean::commands::{EXIT_OK, EXIT_USAGE};
use acctclean::logger;
use acctclean::ui::output_format;
use clap::Parser;
use is_terminal::IsTerminal;
use log::LevelFilter;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // Environment fallbacks for options are read while parsing, so `.env` goes first.
    let _ = dotenvy::dotenv();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(if e.use_stderr() { EXIT_USAGE } else { EXIT_OK });
        }
    };

    let level = if cli.quiet {
        Some(LevelFilter::Off)
    } else if cli.debug {
        Some(LevelFilter::Debug)
    } else {
        None
    };
    logger::init_logger(level);

    let result = match cli.command {
        Commands::Clean(cmd) => acctclean::run_clean(cmd, cli.quiet).await,
        Commands::Rules(cmd) => acctclean::run_rules(&cmd),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let supports_color = std::io::stderr().is_terminal();
            let _ = output_format::print_error_message(&mut std::io::stderr(), &format!("{:#}", e), supports_color);
            ExitCode::from(EXIT_USAGE)
        }
    }
}
