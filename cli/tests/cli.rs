//! Integration tests driving the compiled binary end to end.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("simple-secrets").unwrap();
    cmd.env("CONFIG_DIR", dir.path());
    cmd
}

/// First invocation against an empty directory bootstraps an admin and
/// prints the token to stderr; that token authenticates the `list` call
/// in the assertion below.
fn bootstrap(dir: &TempDir) -> String {
    let output = cmd(dir)
        .args(["list"])
        .env_remove("TOKEN")
        .output()
        .unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr
        .lines()
        .find_map(|l| l.strip_prefix("admin user \"admin\" created, token (shown once): "))
        .expect("expected a bootstrap token on first run")
        .trim()
        .to_string()
}

#[test]
fn bootstrap_then_put_and_get() {
    let dir = TempDir::new().unwrap();
    let token = bootstrap(&dir);

    cmd(&dir)
        .args(["--token", &token, "put", "db", "p@ss"])
        .assert()
        .success();

    cmd(&dir)
        .args(["--token", &token, "get", "db"])
        .assert()
        .success()
        .stdout(predicate::str::contains("p@ss"));
}

#[test]
fn missing_token_fails_with_a_clear_message() {
    let dir = TempDir::new().unwrap();
    bootstrap(&dir);

    cmd(&dir)
        .env_remove("TOKEN")
        .args(["list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no token supplied"));
}

#[test]
fn reader_role_cannot_put() {
    let dir = TempDir::new().unwrap();
    let admin_token = bootstrap(&dir);

    let output = cmd(&dir)
        .args(["--token", &admin_token, "create-user", "r", "reader"])
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    let reader_token = stdout
        .split_whitespace()
        .last()
        .expect("create-user should print the new token")
        .to_string();

    cmd(&dir)
        .args(["--token", &reader_token, "put", "db", "x"])
        .assert()
        .failure();
}

#[test]
fn invalid_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let token = bootstrap(&dir);

    cmd(&dir)
        .args(["--token", &token, "put", "../../etc/passwd", "x"])
        .assert()
        .failure();
}
