//! Library exports for rancher-compose-cli.
//!
//! This module exports the CLI structure for documentation tooling.

pub mod cli;
pub mod commands;
pub mod error;
pub mod utils;

pub use cli::Cli;
