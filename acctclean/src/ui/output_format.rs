// acctclean/src/ui/output_format.rs
//! Prefixed, optionally colored status messages for stderr.

use owo_colors::OwoColorize;
use std::io::{self, Write};

pub fn print_info_message<W: Write>(writer: &mut W, msg: &str, supports_color: bool) -> io::Result<()> {
    if supports_color {
        writeln!(writer, "{} {}", "info:".cyan().bold(), msg)
    } else {
        writeln!(writer, "info: {}", msg)
    }
}

pub fn print_warn_message<W: Write>(writer: &mut W, msg: &str, supports_color: bool) -> io::Result<()> {
    if supports_color {
        writeln!(writer, "{} {}", "warning:".yellow().bold(), msg)
    } else {
        writeln!(writer, "warning: {}", msg)
    }
}

pub fn print_error_message<W: Write>(writer: &mut W, msg: &str, supports_color: bool) -> io::Result<()> {
    if supports_color {
        writeln!(writer, "{} {}", "error:".red().bold(), msg)
    } else {
        writeln!(writer, "error: {}", msg)
    }
}
