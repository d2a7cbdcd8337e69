//! Command to print container API descriptors.

use crate::error::CliError;
use crate::utils::{load_project, GlobalOptions};
use clap::Args;
use std::io::Write;

/// Print container API descriptors as JSON.
#[derive(Args)]
pub struct ConvertCommand {
    /// Convert only this service
    #[arg(long, value_name = "NAME")]
    pub service: Option<String>,
}

impl ConvertCommand {
    /// Execute the command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let project = load_project(global)?;

        let json = match &self.service {
            Some(name) => {
                if !project.services().has(name) {
                    return Err(CliError::InvalidArguments(format!("no such service: {name}")));
                }
                serde_json::to_string_pretty(&project.container_config(name)?)
            }
            None => serde_json::to_string_pretty(&project.container_configs()?),
        }
        .map_err(|e| CliError::SemanticFailure(format!("cannot render JSON: {e}")))?;

        writeln!(std::io::stdout().lock(), "{json}")?;
        Ok(())
    }
}
