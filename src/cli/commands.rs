//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// cloudpilot - Execute cloud deployment plans with cost estimates and rollback.
#[derive(Parser, Debug)]
#[command(name = "cloudpilot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "CLOUDPILOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a plan file.
    Validate {
        /// Plan file (.json, .yaml or .yml).
        plan: PathBuf,
    },

    /// Show the monthly cost estimate of a plan.
    Estimate {
        /// Plan file (.json, .yaml or .yml).
        plan: PathBuf,
    },

    /// Execute a plan against the provider gateway.
    Apply {
        /// Plan file (.json, .yaml or .yml).
        plan: PathBuf,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,

        /// Per-call timeout in seconds (overrides configuration).
        #[arg(long)]
        step_timeout: Option<u64>,
    },

    /// Inspect past deployments.
    History {
        /// History subcommand.
        #[command(subcommand)]
        command: HistoryCommands,
    },
}

/// History subcommands.
#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    /// List recorded deployments, newest first.
    List {
        /// Maximum number of records to show.
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show the full report of one deployment.
    Show {
        /// Deployment identifier.
        deployment_id: String,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
