//! Build script for rancher-compose-cli.
//!
//! This script generates the man page at build time using clap_mangen.
//! The generated page is placed in OUT_DIR for inclusion in release builds.
//!
//! Build scripts cannot depend on the crate being built, so the command
//! structure is declared again here.

use clap::{Arg, Command};
use clap_mangen::Man;
use std::fs;
use std::path::PathBuf;

/// Build the CLI command structure for man page generation.
///
/// Keep this structure synchronized with src/cli.rs.
fn build_cli() -> Command {
    Command::new("rancher-compose")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Merge, validate and convert Rancher compose files")
        .long_about(
            "Merges docker-compose and rancher-compose files layer by layer, validates them \
             against the versioned compose schema and converts services into container API \
             descriptors",
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .help("Enable verbose output")
                .global(true)
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .help("Suppress non-essential output")
                .global(true)
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("project-name")
                .short('p')
                .long("project-name")
                .help("Project name used for generated container names")
                .value_name("NAME")
                .global(true)
                .env("RANCHER_COMPOSE_PROJECT_NAME"),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .help("Compose file to merge; repeat to add override layers")
                .value_name("FILE")
                .global(true)
                .action(clap::ArgAction::Append)
                .env("RANCHER_COMPOSE_FILE"),
        )
        .arg(
            Arg::new("env-file")
                .long("env-file")
                .help("Variables file layered over the process environment")
                .value_name("PATH")
                .global(true),
        )
        .subcommands(vec![
            Command::new("config")
                .about("Print the merged configuration")
                .long_about("Merge every compose file and print the resulting configuration"),
            Command::new("validate")
                .about("Validate a compose file")
                .long_about("Parse a compose file and check every service against its schema"),
            Command::new("convert")
                .about("Print container API descriptors")
                .long_about("Convert merged services into container and host config JSON"),
            Command::new("completions")
                .about("Generate shell completion scripts")
                .long_about("Generate shell completion scripts for bash, zsh, fish, or PowerShell"),
        ])
}

fn main() -> std::io::Result<()> {
    let out_dir = PathBuf::from(std::env::var_os("OUT_DIR").ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR is not set")
    })?);
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir)?;

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer)?;
    fs::write(man_dir.join("rancher-compose.1"), buffer)?;

    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-changed=src/commands/");
    Ok(())
}
