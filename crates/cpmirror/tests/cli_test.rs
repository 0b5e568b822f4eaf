//! Integration tests for the `cpmirror` CLI binary.
//!
//! Most tests run without a management server. The sync round trip uses
//! a wiremock server on localhost.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Map, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cpmirror_core::{LocalStore, RemoteObject, SqliteStore};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `cpmirror` binary with env isolation.
///
/// Clears all `CPMIRROR_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn cpmirror_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("cpmirror");
    cmd.env("HOME", "/tmp/cpmirror-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/cpmirror-cli-test-nonexistent")
        .env("XDG_DATA_HOME", "/tmp/cpmirror-cli-test-nonexistent")
        .env_remove("CPMIRROR_PROFILE")
        .env_remove("CPMIRROR_SERVER")
        .env_remove("CPMIRROR_USER")
        .env_remove("CPMIRROR_DOMAIN")
        .env_remove("CPMIRROR_DATABASE")
        .env_remove("CPMIRROR_CONFIG")
        .env_remove("CPMIRROR_OUTPUT")
        .env_remove("CPMIRROR_INSECURE")
        .env_remove("CPMIRROR_TIMEOUT")
        .env_remove("CPMIRROR_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn object(uid: &str, object_type: &str, name: &str) -> RemoteObject {
    RemoteObject {
        uid: uid.into(),
        object_type: object_type.into(),
        name: Some(name.into()),
        fields: Map::new(),
    }
}

fn seed_database(path: &Path) {
    let store = SqliteStore::open(path).unwrap();
    store.insert_or_replace(&object("h1", "host", "web01")).unwrap();
    store.insert_or_replace(&object("h2", "host", "db01")).unwrap();
    store
        .insert_or_replace(&object("n1", "network", "dmz"))
        .unwrap();
    store.commit().unwrap();
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = cpmirror_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_flag() {
    cpmirror_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("Check Point")
            .and(predicate::str::contains("sync"))
            .and(predicate::str::contains("rules"))
            .and(predicate::str::contains("objects")),
    );
}

#[test]
fn test_version_flag() {
    cpmirror_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cpmirror"));
}

#[test]
fn test_completions_zsh() {
    cpmirror_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_bash() {
    cpmirror_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = cpmirror_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("foobar"));
}

#[test]
fn test_sync_without_config_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let output = cpmirror_cmd()
        .arg("--config")
        .arg(dir.path().join("config.toml"))
        .arg("sync")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("No server configured"));
}

#[test]
fn test_unknown_profile_is_not_found() {
    let dir = TempDir::new().unwrap();
    let output = cpmirror_cmd()
        .arg("--config")
        .arg(dir.path().join("config.toml"))
        .args(["--profile", "lab", "status"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("lab"));
}

#[test]
fn test_objects_without_mirror_is_store_error() {
    let dir = TempDir::new().unwrap();
    let output = cpmirror_cmd()
        .arg("--database")
        .arg(dir.path().join("missing.db"))
        .args(["objects", "count"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(5));
    assert!(combined_output(&output).contains("cpmirror sync"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_init_then_profiles() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");

    cpmirror_cmd()
        .arg("--config")
        .arg(&config)
        .args([
            "config", "init", "--name", "lab", "--server", "mgmt.lab", "--user", "admin",
        ])
        .assert()
        .success();

    let written = std::fs::read_to_string(&config).unwrap();
    assert!(written.contains("mgmt.lab"));
    assert!(written.contains(r#"default_profile = "lab""#));

    cpmirror_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "profiles", "-o", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lab"));
}

#[test]
fn test_config_show_masks_password() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        r#"
default_profile = "lab"

[profiles.lab]
server = "mgmt.lab"
user = "admin"
password = "hunter2"
"#,
    )
    .unwrap();

    cpmirror_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hunter2").not())
        .stdout(predicate::str::contains("********"));
}

#[test]
fn test_config_use_unknown_profile_fails() {
    let dir = TempDir::new().unwrap();
    let output = cpmirror_cmd()
        .arg("--config")
        .arg(dir.path().join("config.toml"))
        .args(["config", "use", "nope"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_config_path_honours_flag() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("custom.toml");
    cpmirror_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

// ── Local mirror ────────────────────────────────────────────────────

#[test]
fn test_objects_list_reads_mirror() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("mirror.db");
    seed_database(&db);

    cpmirror_cmd()
        .arg("--database")
        .arg(&db)
        .args(["objects", "list", "--type", "host", "-o", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("h1").and(predicate::str::contains("h2")))
        .stdout(predicate::str::contains("n1").not());
}

#[test]
fn test_objects_count_json() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("mirror.db");
    seed_database(&db);

    let output = cpmirror_cmd()
        .arg("--database")
        .arg(&db)
        .args(["objects", "count", "-o", "json-compact"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value, json!({ "count": 3 }));
}

#[test]
fn test_objects_show_unknown_uid() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("mirror.db");
    seed_database(&db);

    let output = cpmirror_cmd()
        .arg("--database")
        .arg(&db)
        .args(["objects", "show", "nope"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("nope"));
}

// ── Against a management server ─────────────────────────────────────

async fn mount_server(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/web_api/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sid": "sid-cli",
            "api-server-version": "1.9"
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/web_api/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "OK" })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/web_api/show-networks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "objects": [
                { "uid": "n1", "type": "network", "name": "dmz", "subnet4": "10.1.0.0" }
            ],
            "from": 1, "to": 1, "total": 1
        })))
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/web_api/show-[a-z-]+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "objects": [], "from": 0, "to": 0, "total": 0
        })))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sync_then_read_mirror() {
    let server = MockServer::start().await;
    mount_server(&server).await;

    let dir = TempDir::new().unwrap();
    let db = dir.path().join("mirror.db");
    let config = dir.path().join("config.toml");

    let output = cpmirror_cmd()
        .env("CPMIRROR_PASSWORD", "pw")
        .arg("--config")
        .arg(&config)
        .args(["--server", &server.uri(), "--user", "admin"])
        .arg("--database")
        .arg(&db)
        .args(["sync", "-o", "json-compact"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["inserted"], 1);
    assert_eq!(report["skipped"], 0);

    cpmirror_cmd()
        .arg("--database")
        .arg(&db)
        .args(["objects", "show", "n1", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("10.1.0.0"));
}
