//! Main entry point for the rancher-compose CLI.
//!
//! Commands:
//! - `config`: Print the merged configuration
//! - `validate`: Validate a compose file
//! - `convert`: Print container API descriptors
//! - `completions`: Generate shell completion scripts

mod cli;
mod commands;
mod error;
mod utils;

use clap::Parser;
use cli::Cli;
use utils::GlobalOptions;

fn main() {
    let cli = Cli::parse();

    let _level = rancher_compose::init_logger(cli.verbose, cli.quiet);

    let global = GlobalOptions {
        verbose: cli.verbose,
        quiet: cli.quiet,
        project_name: cli.project_name,
        files: cli.files,
        env_file: cli.env_file,
    };

    let result = match cli.command {
        cli::Command::Config(cmd) => cmd.execute(&global),
        cli::Command::Validate(cmd) => cmd.execute(&global),
        cli::Command::Convert(cmd) => cmd.execute(&global),
        cli::Command::Completions(cmd) => cmd.execute(&global),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
