//! Command to print the merged configuration.

use crate::error::CliError;
use crate::utils::{load_project, GlobalOptions};
use clap::{Args, ValueEnum};
use std::io::Write;

/// Output format for the merged configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    /// YAML document.
    Yaml,
    /// Pretty-printed JSON.
    Json,
}

/// Print the merged configuration.
#[derive(Args)]
pub struct ConfigCommand {
    /// Output format
    #[arg(long, value_enum, default_value = "yaml", ignore_case = true)]
    pub format: ConfigFormat,

    /// Print only the service names, one per line
    #[arg(long)]
    pub services: bool,
}

impl ConfigCommand {
    /// Execute the command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        let project = load_project(global)?;
        let mut stdout = std::io::stdout().lock();

        if self.services {
            for name in project.services().keys() {
                writeln!(stdout, "{name}")?;
            }
            return Ok(());
        }

        let config = project.config();
        let rendered = match self.format {
            ConfigFormat::Yaml => serde_yaml::to_string(&config)
                .map_err(|e| CliError::SemanticFailure(format!("cannot render YAML: {e}")))?,
            ConfigFormat::Json => {
                let mut json = serde_json::to_string_pretty(&config)
                    .map_err(|e| CliError::SemanticFailure(format!("cannot render JSON: {e}")))?;
                json.push('\n');
                json
            }
        };
        stdout.write_all(rendered.as_bytes())?;
        Ok(())
    }
}
