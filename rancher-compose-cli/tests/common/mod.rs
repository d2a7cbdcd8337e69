//! Common test utilities for CLI integration tests.
//!
//! This module provides shared helpers for CLI testing, including:
//! - Test environment setup with temporary directories
//! - Command builders that ignore the caller's environment
//! - Compose file fixtures

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Base compose file used by most tests.
pub const COMPOSE_YML: &str = r#"version: "2"
services:
  web:
    image: nginx:${RC_CLI_TAG}
    ports:
      - "8080:80"
    environment:
      - MODE=production
    links:
      - db
  db:
    image: postgres:16
    restart: always
"#;

/// Override layer merged after [`COMPOSE_YML`].
pub const RANCHER_YML: &str = r#"version: "2"
services:
  web:
    scale: 3
    environment:
      - MODE=staging
"#;

/// Test environment with an isolated working directory.
pub struct TestEnv {
    /// Temporary directory (kept alive for the duration of the test)
    #[allow(dead_code)]
    temp_dir: TempDir,
    /// Path to the temporary directory
    pub temp_path: PathBuf,
}

#[allow(dead_code)]
impl TestEnv {
    /// Create a new, empty test environment.
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let temp_path = temp_dir.path().to_path_buf();
        Self {
            temp_dir,
            temp_path,
        }
    }

    /// Create a test environment holding `docker-compose.yml`,
    /// `rancher-compose.yml` and a `vars.env` defining the image tag.
    pub fn with_project() -> Self {
        let env = Self::new();
        env.write("docker-compose.yml", COMPOSE_YML);
        env.write("rancher-compose.yml", RANCHER_YML);
        env.write("vars.env", "RC_CLI_TAG=1.25\n");
        env
    }

    /// Get a bare command builder running inside the test directory.
    ///
    /// Variables the CLI reads from the environment are cleared so the
    /// caller's shell cannot leak into the test.
    pub fn command_bare(&self) -> Command {
        let mut cmd = Command::cargo_bin("rancher-compose").expect("Failed to find binary");
        cmd.current_dir(&self.temp_path)
            .env_remove("RANCHER_COMPOSE_FILE")
            .env_remove("RANCHER_COMPOSE_PROJECT_NAME")
            .env_remove("RC_CLI_TAG");
        cmd
    }

    /// Get a command builder with the project name and variables file set.
    pub fn command(&self) -> Command {
        let mut cmd = self.command_bare();
        cmd.arg("--project-name")
            .arg("shop")
            .arg("--env-file")
            .arg(self.temp_path.join("vars.env"));
        cmd
    }

    /// Get the temp path.
    pub fn path(&self) -> &Path {
        &self.temp_path
    }

    /// Write a file under the test directory and return its path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_path.join(name);
        std::fs::write(&path, contents).expect("Failed to write test file");
        path
    }
}

/// Run a command, assert success and parse stdout as JSON.
#[allow(dead_code)]
pub fn json_output(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout is not valid JSON")
}
