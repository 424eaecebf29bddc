// acctclean/src/commands/rules.rs
//! `acctclean rules`: shows which rules a `clean` with the same options would apply.

use acctclean_core::compile_rules;
use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use std::io::{self, Write};

use super::{build_config, EXIT_OK};
use crate::cli::RulesCommand;
use crate::ui::summary;

pub fn run_rules(cmd: &RulesCommand) -> Result<u8> {
    let config = build_config(&cmd.rules)?;
    compile_rules(&config.rules).context("Failed to compile retention rules")?;

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    if cmd.json {
        serde_json::to_writer_pretty(&mut writer, &config.rules)?;
        writeln!(writer)?;
    } else {
        summary::print_rules(&config.rules, &mut writer, stdout.is_terminal())?;
    }
    Ok(EXIT_OK)
}
