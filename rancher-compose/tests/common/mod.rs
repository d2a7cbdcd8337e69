//! Common test utilities for integration tests.
//!
//! This module provides fixture paths and project builders for testing
//! the rancher-compose library.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use rancher_compose::{FileResourceLookup, MapEnvLookup, Merger, Project, Validator};

/// Path to a file under `tests/fixtures/compose`.
#[allow(dead_code)]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("compose")
        .join(name)
}

/// The embedded-schema validator, compiled once per test binary.
#[allow(dead_code)]
pub fn validator() -> Arc<Validator> {
    static VALIDATOR: OnceLock<Arc<Validator>> = OnceLock::new();
    Arc::clone(VALIDATOR.get_or_init(|| Arc::new(Validator::new().unwrap())))
}

/// Builds a map of variables from `(key, value)` pairs.
#[allow(dead_code)]
pub fn variables(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// A merger reading files from disk and variables from `pairs`.
#[allow(dead_code)]
pub fn file_merger(pairs: &[(&str, &str)]) -> Merger {
    Merger::new(validator())
        .with_environment_lookup(Arc::new(MapEnvLookup::new(variables(pairs))))
        .with_resource_lookup(Arc::new(FileResourceLookup))
}

/// A project with the given fixture files merged in order.
#[allow(dead_code)]
pub fn fixture_project(files: &[&str], pairs: &[(&str, &str)]) -> Project {
    let mut project = Project::new("shop", file_merger(pairs));
    for file in files {
        project
            .parse_file(&fixture_path(file))
            .unwrap_or_else(|err| panic!("failed to merge {file}: {err}"));
    }
    project
}

/// Variables the shop fixtures reference.
#[allow(dead_code)]
pub const SHOP_VARIABLES: &[(&str, &str)] = &[("NGINX_TAG", "1.25"), ("WORKER_SCALE", "2")];
