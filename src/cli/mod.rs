//! CLI module
//!
//! Command-line interface for the export.
//!
//! A single invocation resolves the configuration, obtains a token, fetches
//! the trailing window of recordings and writes the CSV file. There are no
//! subcommands.

mod commands;
mod runner;

pub use commands::Cli;
pub use runner::Runner;
