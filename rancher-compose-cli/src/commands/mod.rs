//! CLI command implementations.
//!
//! - `config`: Merge compose files and print the result
//! - `validate`: Check one compose file against its schema
//! - `convert`: Print container API descriptors
//! - `completions`: Generate shell completion scripts

pub mod completions;
pub mod config;
pub mod convert;
pub mod validate;

pub use completions::CompletionsCommand;
pub use config::ConfigCommand;
pub use convert::ConvertCommand;
pub use validate::ValidateCommand;
