//! Integration tests for settings files and their resolution.

mod common;

use common::TestEnv;
use predicates::prelude::*;

fn show_json(cmd: &mut assert_cmd::Command) -> serde_json::Value {
    let output = cmd.args(["config", "show", "--json"]).output().unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

fn setting<'a>(json: &'a serde_json::Value, key: &str) -> &'a serde_json::Value {
    json["settings"]
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["key"] == key)
        .unwrap()
}

#[test]
fn test_config_init_creates_files() {
    let env = TestEnv::new();
    env.t2r()
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));

    assert!(env.config_file().exists());
    assert!(env.state_file().exists());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(env.state_file()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn test_config_init_keeps_existing_files() {
    let env = TestEnv::new();
    env.write_config("area \"Work\"\n");
    env.t2r()
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Kept existing"));

    let content = std::fs::read_to_string(env.config_file()).unwrap();
    assert_eq!(content, "area \"Work\"\n");
}

#[test]
fn test_config_show_defaults() {
    let env = TestEnv::new();
    let json = show_json(&mut env.t2r());

    let area = setting(&json, "area");
    assert_eq!(area["value"], "Uni");
    assert_eq!(area["source"], "default");
    assert_eq!(setting(&json, "reclaim-token")["value"], "(not set)");
}

#[test]
fn test_config_show_reads_files_and_masks_tokens() {
    let env = TestEnv::new();
    env.write_config("area \"Semester\"\ntracking-days 14\n");
    env.write_state("reclaim-token \"rcl_0123456789abcdef\"\n");

    let json = show_json(&mut env.t2r());
    let area = setting(&json, "area");
    assert_eq!(area["value"], "Semester");
    assert!(area["source"].as_str().unwrap().starts_with("file:"));
    assert_eq!(setting(&json, "tracking-days")["value"], "14");

    let token = setting(&json, "reclaim-token")["value"].as_str().unwrap().to_string();
    assert_eq!(token, "rcl_...cdef");
}

#[test]
fn test_env_overrides_state_file() {
    let env = TestEnv::new();
    env.write_state("toggl-token \"from-file-token-123\"\n");

    let mut cmd = env.t2r();
    cmd.env("T2R_TOGGL_TOKEN", "from-env-token-456");
    let json = show_json(&mut cmd);
    let token = setting(&json, "toggl-token");
    assert_eq!(token["source"], "env:T2R_TOGGL_TOKEN");
    assert_eq!(token["value"], "from...-456");
}

#[test]
fn test_db_flag_overrides_everything() {
    let env = TestEnv::new();
    env.write_config("database-path \"/from/config.db\"\n");

    let mut cmd = env.t2r();
    cmd.env("T2R_DB_PATH", "/from/env.db").args(["--db", "/from/flag.db"]);
    let json = show_json(&mut cmd);
    let db = setting(&json, "database-path");
    assert_eq!(db["value"], "/from/flag.db");
    assert_eq!(db["source"], "cli");
}

#[test]
fn test_invalid_config_is_reported() {
    let env = TestEnv::new();
    env.write_config("tracking-days 365\n");
    env.t2r()
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("tracking-days"));
}

#[test]
fn test_missing_token_is_an_error() {
    let env = TestEnv::new();
    env.t2r()
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error:"))
        .stderr(predicate::str::contains("reclaim-token"));
}

#[test]
fn test_missing_token_json_error() {
    let env = TestEnv::new();
    let output = env.t2r().args(["--json", "time"]).output().unwrap();
    assert!(!output.status.success());
    let error: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert!(error["error"].as_str().unwrap().contains("reclaim-token"));
}

#[test]
fn test_tracking_rejects_long_window() {
    let env = TestEnv::new();
    env.t2r()
        .args(["tracking", "120"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("since-days"));
}
