//! CLI module for the cloudpilot deployment tool.
//!
//! This module provides the command-line interface for validating,
//! pricing and applying deployment plans.

mod commands;
mod output;

pub use commands::{Cli, Commands, HistoryCommands, OutputFormat};
pub use output::OutputFormatter;
