//! Collaborators the pipeline consults for variables and files.
//!
//! The merge pipeline never reads the process environment or the
//! filesystem directly. It goes through an [`EnvironmentLookup`] for
//! variables and a [`ResourceLookup`] for `env_file`, `extends` and build
//! context access, so callers decide where values come from.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::config::types::ServiceConfig;
use crate::error::{Error, Result};

/// Source of variables for interpolation and bare environment entries.
pub trait EnvironmentLookup: Send + Sync {
    /// Returns candidate values for `key`, optionally scoped to a service.
    ///
    /// An empty vector means the variable is unknown.
    fn lookup(&self, key: &str, config: Option<&ServiceConfig>) -> Vec<String>;

    /// Returns the full variable set used for bulk interpolation.
    fn variables(&self) -> HashMap<String, String>;
}

/// Loader for files referenced from a compose file.
#[cfg_attr(test, mockall::automock)]
pub trait ResourceLookup: Send + Sync {
    /// Reads `file` relative to the compose file `relative_to`.
    ///
    /// Returns the contents and the resolved path of the file that was read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceLookup`] if the file cannot be read.
    fn lookup(&self, file: &str, relative_to: &str) -> Result<(Vec<u8>, String)>;

    /// Resolves `path` relative to the compose file `in_file` without reading it.
    fn resolve_path(&self, path: &str, in_file: &str) -> String;
}

/// Variables taken from the process environment.
///
/// # Examples
///
/// ```
/// use rancher_compose::lookup::{EnvironmentLookup, OsEnvLookup};
///
/// let lookup = OsEnvLookup;
/// assert!(lookup.lookup("SURELY_NOT_SET_ANYWHERE_42", None).is_empty());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEnvLookup;

impl EnvironmentLookup for OsEnvLookup {
    fn lookup(&self, key: &str, _config: Option<&ServiceConfig>) -> Vec<String> {
        env::var(key).map(|v| vec![v]).unwrap_or_default()
    }

    fn variables(&self) -> HashMap<String, String> {
        env::vars().collect()
    }
}

/// A fixed variable map, optionally layered over another lookup.
///
/// Entries in the map shadow those of the parent.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use rancher_compose::lookup::{EnvironmentLookup, MapEnvLookup};
///
/// let lookup = MapEnvLookup::new(HashMap::from([("TAG".to_string(), "1.0".to_string())]));
/// assert_eq!(lookup.lookup("TAG", None), vec!["1.0"]);
/// assert!(lookup.lookup("OTHER", None).is_empty());
/// ```
pub struct MapEnvLookup {
    variables: HashMap<String, String>,
    parent: Option<Box<dyn EnvironmentLookup>>,
}

impl MapEnvLookup {
    /// Creates a lookup over a fixed set of variables.
    #[must_use]
    pub fn new(variables: HashMap<String, String>) -> Self {
        Self {
            variables,
            parent: None,
        }
    }

    /// Creates a lookup whose variables shadow those of `parent`.
    #[must_use]
    pub fn layered(parent: Box<dyn EnvironmentLookup>, variables: HashMap<String, String>) -> Self {
        Self {
            variables,
            parent: Some(parent),
        }
    }
}

impl EnvironmentLookup for MapEnvLookup {
    fn lookup(&self, key: &str, config: Option<&ServiceConfig>) -> Vec<String> {
        if let Some(value) = self.variables.get(key) {
            return vec![value.clone()];
        }
        self.parent
            .as_ref()
            .map(|parent| parent.lookup(key, config))
            .unwrap_or_default()
    }

    fn variables(&self) -> HashMap<String, String> {
        let mut merged = self
            .parent
            .as_ref()
            .map(|parent| parent.variables())
            .unwrap_or_default();
        merged.extend(self.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

/// Reads referenced files from the local filesystem.
///
/// Relative paths resolve against the directory of the referencing compose
/// file; `~/` expands to the user's home directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileResourceLookup;

impl FileResourceLookup {
    fn resolve(path: &str, in_file: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = home::home_dir() {
                return home.join(rest);
            }
        }
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            return candidate.to_path_buf();
        }
        let base = Path::new(in_file)
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        base.join(candidate)
    }
}

impl ResourceLookup for FileResourceLookup {
    fn lookup(&self, file: &str, relative_to: &str) -> Result<(Vec<u8>, String)> {
        let resolved = Self::resolve(file, relative_to);
        log::debug!("reading {} for {relative_to}", resolved.display());
        let contents = std::fs::read(&resolved).map_err(|e| Error::ResourceLookup {
            resource: resolved.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok((contents, resolved.display().to_string()))
    }

    fn resolve_path(&self, path: &str, in_file: &str) -> String {
        Self::resolve(path, in_file).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_map_lookup_shadows_parent() {
        let parent = MapEnvLookup::new(HashMap::from([
            ("A".to_string(), "parent".to_string()),
            ("B".to_string(), "parent".to_string()),
        ]));
        let child = MapEnvLookup::layered(
            Box::new(parent),
            HashMap::from([("A".to_string(), "child".to_string())]),
        );

        assert_eq!(child.lookup("A", None), vec!["child"]);
        assert_eq!(child.lookup("B", None), vec!["parent"]);
        let vars = child.variables();
        assert_eq!(vars["A"], "child");
        assert_eq!(vars["B"], "parent");
    }

    #[test]
    fn test_file_lookup_relative_to_compose_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.env"), "FOO=bar\n").unwrap();
        let compose = dir.path().join("docker-compose.yml");

        let (contents, resolved) = FileResourceLookup
            .lookup("app.env", &compose.display().to_string())
            .unwrap();
        assert_eq!(contents, b"FOO=bar\n");
        assert!(resolved.ends_with("app.env"));
    }

    #[test]
    fn test_file_lookup_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let compose = dir.path().join("docker-compose.yml");
        let err = FileResourceLookup
            .lookup("missing.env", &compose.display().to_string())
            .unwrap_err();
        assert!(matches!(err, Error::ResourceLookup { .. }));
    }

    #[test]
    fn test_resolve_path_absolute_and_bare() {
        assert_eq!(
            FileResourceLookup.resolve_path("/abs/ctx", "/project/docker-compose.yml"),
            "/abs/ctx"
        );
        assert_eq!(
            FileResourceLookup.resolve_path("ctx", "docker-compose.yml"),
            "./ctx"
        );
        assert_eq!(
            FileResourceLookup.resolve_path("./app", "/project/docker-compose.yml"),
            "/project/./app"
        );
    }
}
