//! CLI integration tests for matview-migrate.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for error conditions that need no database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the matview-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("matview-migrate").unwrap()
}

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

const SAME_SCHEMA: &str = r#"
source:
  host: db.internal
  database: warehouse
  user: app
target:
  host: db.internal
  database: warehouse
  user: app
"#;

const VALID: &str = r#"
source:
  host: 127.0.0.1
  port: 1
  database: warehouse
  user: reader
  ssl_mode: disable
target:
  host: 127.0.0.1
  port: 2
  database: reporting
  user: writer
  ssl_mode: disable
"#;

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--tables"))
        .stdout(predicate::str::contains("--target-tables"))
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--continue-on-error"));
}

#[test]
fn test_run_help_warns_about_dropping_tables() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dropped and recreated"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("matview-migrate"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_progress_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--progress"));
}

#[test]
fn test_output_json_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_log_format_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

#[test]
fn test_verbosity_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // Missing file is an IO error (code 7), not config error (code 1)
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let file = config_file("invalid: yaml: content: [\n");

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_required_fields_exits_with_code_1() {
    let file = config_file("source:\n  host: localhost\n");

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_same_source_and_target_is_rejected() {
    let file = config_file(SAME_SCHEMA);

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot be the same"));
}

#[test]
fn test_zero_batch_size_is_rejected() {
    let file = config_file(VALID);

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "run",
            "--batch-size",
            "0",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("batch_size"));
}

#[test]
fn test_unreachable_source_exits_with_code_2() {
    let file = config_file(VALID);

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Connection error (source)"));
}

#[test]
fn test_health_check_reports_unreachable_databases() {
    let file = config_file(VALID);

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Source: FAILED"))
        .stdout(predicate::str::contains("Target: FAILED"))
        .stdout(predicate::str::contains("Overall: UNHEALTHY"));
}

#[test]
fn test_health_check_json_report() {
    let file = config_file(VALID);

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "--output-json",
            "health-check",
        ])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("\"healthy\": false"))
        .stdout(predicate::str::contains("\"source_error\""));
}

// =============================================================================
// Subcommand Existence Tests
// =============================================================================

#[test]
fn test_health_check_command_exists() {
    cmd()
        .args(["health-check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Test database connections"));
}

#[test]
fn test_validate_command_exists() {
    cmd()
        .args(["validate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Validate row counts"));
}

// =============================================================================
// Config Path Tests
// =============================================================================

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_short_config_flag() {
    // -c should work as short for --config
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
