//! CLI module for critiquer - command-line interface and subcommands.
//!
//! Running without a subcommand starts a critique run with the configured
//! prompt; `history` inspects the record store.

pub mod commands;

pub use commands::Cli;
