// acctclean/src/lib.rs
//! # acctclean CLI Application
//!
//! Command-line front end for `acctclean-core`: argument parsing, logger setup,
//! rule selection and human or JSON reporting.

pub mod cli;
pub mod commands;
pub mod logger;
pub mod ui;

pub use commands::clean::run_clean;
pub use commands::rules::run_rules;
