//! End-to-end tests for the `sleuth` binary.
//!
//! Every test runs the binary as a subprocess against a private temp
//! directory holding the config, the case catalog and the token store. The
//! API URL points at a closed local port; only paths that never reach the
//! network are exercised.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn sleuth_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sleuth"))
}

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("cases.json"),
            r#"[
                {"id": 1, "title": "The Lighthouse", "description": "A keeper vanished.", "createdDate": "2025-01-04"},
                {"id": 2, "title": "The Orchard", "description": "Apples, counted twice."}
            ]"#,
        )
        .expect("write catalog");
        let config = format!(
            "api_base_url = \"http://127.0.0.1:9\"\n\
             request_timeout_secs = 2\n\
             catalog_path = \"{}\"\n\
             \n\
             [storage]\n\
             backend = \"file\"\n\
             state_dir = \"{}\"\n",
            dir.path().join("cases.json").display(),
            dir.path().join("state").display(),
        );
        std::fs::write(dir.path().join("sleuth.toml"), config).expect("write config");
        Self { dir }
    }

    fn token_path(&self) -> PathBuf {
        self.dir.path().join("state").join("session_token.json")
    }

    fn store_token(&self, expires_at: i64) {
        std::fs::create_dir_all(self.dir.path().join("state")).expect("state dir");
        std::fs::write(
            self.token_path(),
            format!(
                r#"{{"access_token": "T-stored", "wallet_address": "0xabc", "expires_at": {expires_at}}}"#
            ),
        )
        .expect("write token");
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(sleuth_bin())
            .arg("--config")
            .arg(self.dir.path().join("sleuth.toml"))
            .args(args)
            .env_remove("SLEUTH_API_URL")
            .current_dir(self.dir.path())
            .output()
            .expect("run sleuth")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn assert_missing(path: &Path) {
    assert!(!path.exists(), "{} should not exist", path.display());
}

#[test]
fn cases_list_reads_catalog() {
    let env = Env::new();
    let output = env.run(&["cases", "list"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("The Lighthouse  (2025-01-04)"));
    assert!(out.contains("The Orchard"));
}

#[test]
fn cases_show_json() {
    let env = Env::new();
    let output = env.run(&["--json", "cases", "show", "2"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let case: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(case["title"], "The Orchard");
    assert_eq!(case["description"], "Apples, counted twice.");
}

#[test]
fn cases_show_unknown_id_fails() {
    let env = Env::new();
    let output = env.run(&["cases", "show", "99"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("99"));
}

#[test]
fn whoami_without_token_is_anonymous() {
    let env = Env::new();
    let output = env.run(&["whoami"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "Status: anonymous");
}

#[test]
fn expired_token_is_discarded_on_startup() {
    let env = Env::new();
    env.store_token(1);

    let output = env.run(&["--json", "whoami"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(summary["status"], "anonymous");
    assert_missing(&env.token_path());
}

#[test]
fn logout_removes_stored_token() {
    let env = Env::new();
    env.store_token(4_102_444_800);

    let output = env.run(&["logout"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_missing(&env.token_path());

    // Idempotent.
    assert!(env.run(&["logout"]).status.success());
}

#[test]
fn submit_requires_sign_in() {
    let env = Env::new();
    let output = env.run(&["submit", "--case", "1", "--theory", "He left by boat"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("not signed in"));
}

#[test]
fn submit_rejects_blank_theory() {
    let env = Env::new();
    let output = env.run(&["submit", "--tool", "bias", "--case", "1", "--theory", "   "]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("theory must not be empty"));
}
