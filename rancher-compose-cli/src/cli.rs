//! CLI structure and command definitions.
//!
//! This module defines the main CLI structure using clap's derive macros,
//! including global options and subcommands.

use crate::commands::{CompletionsCommand, ConfigCommand, ConvertCommand, ValidateCommand};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Merge, validate and convert Rancher compose files.
#[derive(Parser)]
#[command(name = "rancher-compose")]
#[command(
    version,
    about = "Merge, validate and convert Rancher compose files",
    long_about = None
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Project name used for generated container names
    #[arg(
        short = 'p',
        long,
        value_name = "NAME",
        global = true,
        env = "RANCHER_COMPOSE_PROJECT_NAME"
    )]
    pub project_name: Option<String>,

    /// Compose file to merge; repeat to add override layers
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        global = true,
        env = "RANCHER_COMPOSE_FILE",
        value_delimiter = ','
    )]
    pub files: Vec<PathBuf>,

    /// Variables file layered over the process environment
    #[arg(long, value_name = "PATH", global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Command {
    /// Print the merged configuration
    Config(ConfigCommand),

    /// Validate a compose file
    Validate(ValidateCommand),

    /// Print container API descriptors as JSON
    Convert(ConvertCommand),

    /// Generate shell completion scripts
    Completions(CompletionsCommand),
}
