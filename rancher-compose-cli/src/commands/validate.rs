//! Command to validate a compose file against its schema.

use crate::error::CliError;
use crate::utils::GlobalOptions;
use clap::Args;
use rancher_compose::config::{create_raw_config, preprocess::preprocess_service_map};
use rancher_compose::Validator;
use std::path::PathBuf;

/// Validate a compose file.
#[derive(Args)]
pub struct ValidateCommand {
    /// Compose file to validate
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

impl ValidateCommand {
    /// Execute the command.
    pub fn execute(self, global: &GlobalOptions) -> Result<(), CliError> {
        if !self.file.exists() {
            return Err(CliError::InvalidArguments(format!(
                "File not found: {}",
                self.file.display()
            )));
        }

        let contents = std::fs::read(&self.file)?;
        let raw = create_raw_config(&contents)?;
        let services = preprocess_service_map(raw.services)?;
        let validator = Validator::new().map_err(|e| CliError::Config(e.to_string()))?;

        let violations = validator.violations(raw.version, &services);
        if violations.is_empty() {
            if !global.quiet {
                println!(
                    "{}: valid (version {}, {} service(s))",
                    self.file.display(),
                    raw.version,
                    services.len()
                );
            }
            return Ok(());
        }

        for violation in &violations {
            println!("{violation}");
        }
        Err(CliError::SemanticFailure(format!(
            "{}: {} schema violation(s)",
            self.file.display(),
            violations.len()
        )))
    }
}
