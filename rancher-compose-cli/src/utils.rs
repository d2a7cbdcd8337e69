//! Utility functions for CLI operations.
//!
//! This module provides common utility functions used across CLI commands,
//! including compose file discovery, merger construction and project loading.

use crate::error::CliError;
use rancher_compose::config::resources::parse_env_file;
use rancher_compose::config::StackInfo;
use rancher_compose::project::normalize_project_name;
use rancher_compose::{
    FileResourceLookup, MapEnvLookup, Merger, OsEnvLookup, Project, Validator,
};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Compose file read when no `--file` is given.
pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";

/// Override file merged after the default compose file when it exists.
pub const DEFAULT_RANCHER_FILE: &str = "rancher-compose.yml";

/// Global CLI options shared across all commands.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Enable verbose output.
    pub verbose: bool,

    /// Suppress non-essential output.
    pub quiet: bool,

    /// Explicit project name.
    pub project_name: Option<String>,

    /// Compose files, in merge order.
    pub files: Vec<PathBuf>,

    /// Additional variables file.
    pub env_file: Option<PathBuf>,
}

/// Returns the compose files to merge.
///
/// Without explicit files, `docker-compose.yml` in the current directory is
/// used, followed by `rancher-compose.yml` when present.
pub fn resolve_files(global: &GlobalOptions) -> Result<Vec<PathBuf>, CliError> {
    if !global.files.is_empty() {
        return Ok(global.files.clone());
    }

    let cwd = env::current_dir()?;
    let compose = cwd.join(DEFAULT_COMPOSE_FILE);
    if !compose.exists() {
        return Err(CliError::InvalidArguments(format!(
            "no compose file given and {} not found",
            compose.display()
        )));
    }

    let mut files = vec![compose];
    let rancher = cwd.join(DEFAULT_RANCHER_FILE);
    if rancher.exists() {
        files.push(rancher);
    }
    Ok(files)
}

/// Determines the project name.
///
/// Priority: `--project-name` > directory of the first compose file.
pub fn resolve_project_name(global: &GlobalOptions, files: &[PathBuf]) -> Result<String, CliError> {
    let raw = match &global.project_name {
        Some(name) => name.clone(),
        None => {
            let first = files.first().map_or_else(|| PathBuf::from("."), Clone::clone);
            let absolute = if first.is_absolute() {
                first
            } else {
                env::current_dir()?.join(first)
            };
            absolute
                .parent()
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        }
    };

    let name = normalize_project_name(&raw);
    if name.is_empty() {
        return Err(CliError::InvalidArguments(format!(
            "cannot derive a project name from '{raw}'; use --project-name"
        )));
    }
    Ok(name)
}

/// Reads the variables declared in `--env-file`.
pub fn load_env_file(path: &Path) -> Result<HashMap<String, String>, CliError> {
    let contents = fs::read_to_string(path).map_err(|e| {
        CliError::Config(format!("cannot read env file {}: {e}", path.display()))
    })?;
    Ok(parse_env_file(&contents)
        .into_iter()
        .filter_map(|entry| {
            entry
                .split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
        })
        .collect())
}

/// Builds a merger reading variables from the process environment (plus
/// `--env-file`) and files from disk.
pub fn build_merger(global: &GlobalOptions, project_name: &str) -> Result<Merger, CliError> {
    let validator = Validator::new().map_err(|e| CliError::Config(e.to_string()))?;

    let variables = match &global.env_file {
        Some(path) => load_env_file(path)?,
        None => HashMap::new(),
    };
    let lookup = MapEnvLookup::layered(Box::new(OsEnvLookup), variables);

    Ok(Merger::new(Arc::new(validator))
        .with_environment_lookup(Arc::new(lookup))
        .with_resource_lookup(Arc::new(FileResourceLookup))
        .with_stack(StackInfo {
            name: project_name.to_string(),
            ..StackInfo::default()
        }))
}

/// Merges every compose file into a project.
pub fn load_project(global: &GlobalOptions) -> Result<Project, CliError> {
    let files = resolve_files(global)?;
    let name = resolve_project_name(global, &files)?;
    let mut project = Project::new(name.clone(), build_merger(global, &name)?);

    for file in &files {
        if global.verbose {
            eprintln!("Merging {}", file.display());
        }
        project.parse_file(file)?;
    }
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_files_win() {
        let global = GlobalOptions {
            files: vec![PathBuf::from("a.yml"), PathBuf::from("b.yml")],
            ..GlobalOptions::default()
        };
        assert_eq!(resolve_files(&global).unwrap().len(), 2);
    }

    #[test]
    fn test_project_name_from_directory() {
        let global = GlobalOptions::default();
        let name =
            resolve_project_name(&global, &[PathBuf::from("/srv/My.Shop/docker-compose.yml")])
                .unwrap();
        assert_eq!(name, "myshop");
    }

    #[test]
    fn test_explicit_project_name_normalized() {
        let global = GlobalOptions {
            project_name: Some("Web App".to_string()),
            ..GlobalOptions::default()
        };
        assert_eq!(resolve_project_name(&global, &[]).unwrap(), "webapp");
    }

    #[test]
    fn test_unusable_project_name() {
        let global = GlobalOptions {
            project_name: Some("...".to_string()),
            ..GlobalOptions::default()
        };
        assert_eq!(
            resolve_project_name(&global, &[]).unwrap_err().exit_code(),
            4
        );
    }

    #[test]
    fn test_env_file_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vars.env");
        fs::write(&path, "# comment\nTAG=1.0\nexport NAME=web\nBARE\n").unwrap();

        let vars = load_env_file(&path).unwrap();
        assert_eq!(vars["TAG"], "1.0");
        assert_eq!(vars["NAME"], "web");
        assert!(!vars.contains_key("BARE"));

        let missing = load_env_file(&dir.path().join("nope.env")).unwrap_err();
        assert_eq!(missing.exit_code(), 7);
    }
}
