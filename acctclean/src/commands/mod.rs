// acctclean/src/commands/mod.rs
//! Subcommand implementations.

pub mod clean;
pub mod rules;

use acctclean_core::{merge_rules, CleanerConfig};
use anyhow::Result;
use log::debug;

use crate::cli::RuleSelection;

pub const EXIT_OK: u8 = 0;
/// Bad configuration or usage.
pub const EXIT_USAGE: u8 = 1;
/// At least one run was aborted; its original is untouched.
pub const EXIT_ABORTED: u8 = 2;
/// At least one input could not be read.
pub const EXIT_FATAL_IO: u8 = 3;

/// Built-in rules (unless disabled), merged with the user's file, filtered by
/// `--enable`/`--disable`.
pub fn build_config(selection: &RuleSelection) -> Result<CleanerConfig> {
    let defaults = if selection.no_default_rules {
        debug!("Built-in rules disabled.");
        CleanerConfig::default()
    } else {
        CleanerConfig::load_default_rules()?
    };
    let user = selection
        .config
        .as_ref()
        .map(CleanerConfig::load_from_file)
        .transpose()?;

    let mut config = merge_rules(defaults, user);
    config.set_active_rules(&selection.enable, &selection.disable);
    Ok(config)
}
