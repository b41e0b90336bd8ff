//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: generate an answer and critique it for N iterations
//! - history: summarize or show runs in the record store

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Critiquer - iterative generate-then-critique over OpenRouter models
#[derive(Parser, Debug)]
#[command(name = "critiquer")]
#[command(author, version = env!("GIT_DESCRIBE"), about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Overrides for a single run; anything unset falls back to the config file
#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    /// Prompt to answer and critique
    pub prompt: Option<String>,

    /// Total iterations, including the primary answer
    #[arg(short = 'n', long)]
    pub iterations: Option<u32>,

    /// Critique style, e.g. "critical review"
    #[arg(short = 't', long)]
    pub critique_type: Option<String>,

    /// Model that produces the initial answer
    #[arg(long)]
    pub primary: Option<String>,

    /// Critic used on even iterations
    #[arg(long)]
    pub critic_a: Option<String>,

    /// Critic used on odd iterations
    #[arg(long)]
    pub critic_b: Option<String>,

    /// Record store path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Ask models not to return reasoning
    #[arg(long)]
    pub no_reasoning: bool,
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a prompt and critique the answer
    Run(RunArgs),

    /// Show runs recorded in the store
    History {
        /// Record store path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show every snapshot of one run
        #[arg(short, long)]
        run: Option<String>,

        /// Only the most recent N runs
        #[arg(short, long)]
        last: Option<usize>,
    },
}
