// acctclean/src/logger.rs
//! Logger setup for the CLI.
//!
//! Logs go to stderr so stdout carries only the summary table or JSON. An
//! explicit level overrides `RUST_LOG`; otherwise `RUST_LOG` applies, falling
//! back to `info`.

use env_logger::{Builder, Env, Target};
use log::LevelFilter;

pub fn init_logger(level: Option<LevelFilter>) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.target(Target::Stderr).format_timestamp_secs();
    if let Some(level) = level {
        builder.filter_level(level);
    }
    // A second initialisation (e.g. from tests) is not an error worth reporting.
    let _ = builder.try_init();
}
