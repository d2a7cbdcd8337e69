//! Integration tests for the rancher-compose CLI.
//!
//! These tests verify that the CLI binary behaves correctly, including
//! argument parsing, help text, version output and the exit codes of
//! every command.

mod common;

use assert_cmd::Command;
use common::{json_output, TestEnv};
use predicates::prelude::*;

/// Test that the binary without arguments fails and displays usage.
#[test]
fn test_cli_no_arguments() {
    let mut cmd = Command::cargo_bin("rancher-compose").expect("Failed to find binary");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

/// Test that the --version flag displays version information.
#[test]
fn test_cli_version_flag() {
    let mut cmd = Command::cargo_bin("rancher-compose").expect("Failed to find binary");

    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("rancher-compose"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

/// Test that the --help flag lists every command.
#[test]
fn test_cli_help_flag() {
    let mut cmd = Command::cargo_bin("rancher-compose").expect("Failed to find binary");

    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("convert"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_invalid_subcommand() {
    let mut cmd = Command::cargo_bin("rancher-compose").expect("Failed to find binary");

    cmd.arg("deploy");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_config_services_uses_default_files() {
    let env = TestEnv::with_project();

    env.command()
        .args(["config", "--services"])
        .assert()
        .success()
        .stdout("db\nweb\n");
}

#[test]
fn test_config_json_merges_layers() {
    let env = TestEnv::with_project();

    let json = json_output(env.command().args(["config", "--format", "json"]));
    let web = &json["services"]["web"];

    assert_eq!(web["image"], "nginx:1.25");
    let environment = web["environment"].to_string();
    assert!(environment.contains("MODE=production"));
    assert!(environment.contains("MODE=staging"));
    assert_eq!(json["services"]["db"]["restart"], "always");
}

#[test]
fn test_config_yaml_output() {
    let env = TestEnv::with_project();

    env.command()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("services:"))
        .stdout(predicate::str::contains("postgres:16"));
}

#[test]
fn test_config_explicit_file_skips_override() {
    let env = TestEnv::with_project();

    let json = json_output(
        env.command()
            .args(["--file", "docker-compose.yml", "config", "--format", "json"]),
    );
    let environment = json["services"]["web"]["environment"].to_string();

    assert!(environment.contains("MODE=production"));
    assert!(!environment.contains("MODE=staging"));
}

#[test]
fn test_config_file_list_from_environment() {
    let env = TestEnv::with_project();

    env.command()
        .env("RANCHER_COMPOSE_FILE", "docker-compose.yml,rancher-compose.yml")
        .args(["config", "--services"])
        .assert()
        .success()
        .stdout(predicate::str::contains("web"));
}

#[test]
fn test_config_without_compose_file() {
    let env = TestEnv::new();

    env.command_bare()
        .args(["--project-name", "shop", "config"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("docker-compose.yml"));
}

#[test]
fn test_config_missing_explicit_file() {
    let env = TestEnv::new();

    env.command_bare()
        .args(["--project-name", "shop", "--file", "absent.yml", "config"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("absent.yml"));
}

#[test]
fn test_config_unreadable_env_file() {
    let env = TestEnv::with_project();

    env.command_bare()
        .args(["--project-name", "shop", "--env-file", "nope.env", "config"])
        .assert()
        .code(7);
}

#[test]
fn test_validate_valid_file() {
    let env = TestEnv::with_project();

    env.command_bare()
        .args(["validate", "docker-compose.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid (version 2, 2 service(s))"));
}

#[test]
fn test_validate_quiet_prints_nothing() {
    let env = TestEnv::with_project();

    env.command_bare()
        .args(["--quiet", "validate", "docker-compose.yml"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_validate_reports_violations() {
    let env = TestEnv::new();
    env.write(
        "broken.yml",
        "version: \"2\"\nservices:\n  web:\n    image: nginx\n    privileged: \"maybe\"\n",
    );

    env.command_bare()
        .args(["validate", "broken.yml"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("web.privileged"))
        .stdout(predicate::str::contains("expected: boolean"))
        .stderr(predicate::str::contains("1 schema violation(s)"));
}

#[test]
fn test_validate_missing_file() {
    let env = TestEnv::new();

    env.command_bare()
        .args(["validate", "nope.yml"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn test_convert_single_service() {
    let env = TestEnv::with_project();

    let json = json_output(env.command().args(["convert", "--service", "web"]));

    assert_eq!(json["config"]["Image"], "nginx:1.25");
    assert_eq!(json["config"]["Env"], serde_json::json!(["MODE=staging"]));
    assert_eq!(
        json["host_config"]["Links"],
        serde_json::json!(["shop_db_1:db"])
    );
    assert_eq!(
        json["host_config"]["PortBindings"]["80/tcp"][0]["HostPort"],
        "8080"
    );
}

#[test]
fn test_convert_all_services() {
    let env = TestEnv::with_project();

    let json = json_output(env.command().arg("convert"));

    assert_eq!(json["db"]["host_config"]["RestartPolicy"]["Name"], "always");
    assert!(json["web"].is_object());
}

#[test]
fn test_convert_unknown_service() {
    let env = TestEnv::with_project();

    env.command()
        .args(["convert", "--service", "cache"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("no such service: cache"));
}

#[test]
fn test_completions_bash() {
    let env = TestEnv::new();

    env.command_bare()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rancher-compose"));
}
