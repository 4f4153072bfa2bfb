//! End-to-end CLI checks that do not need any external tool installed.

use assert_cmd::Command;
use predicates::prelude::*;

fn cli(tmp: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ollama-prep-cli").unwrap();
    // Keep confy and the cache away from the real user directories.
    cmd.env("XDG_CONFIG_HOME", tmp.path().join("config"));
    cmd.env("XDG_CACHE_HOME", tmp.path().join("xdg-cache"));
    cmd.arg("--cache-root").arg(tmp.path().join("cache"));
    cmd
}

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("ollama-prep-cli")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("setup").and(predicate::str::contains("cache")));
}

#[test]
fn unknown_flag_is_a_usage_error() {
    Command::cargo_bin("ollama-prep-cli")
        .unwrap()
        .arg("--no-such-flag")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn cache_info_reports_the_chosen_root() {
    let tmp = tempfile::tempdir().unwrap();
    cli(&tmp)
        .args(["cache", "info"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("downloads")
                .and(predicate::str::contains("merged"))
                .and(predicate::str::contains(
                    tmp.path().join("cache").to_str().unwrap(),
                )),
        );
}

#[test]
fn cache_info_json_is_parseable() {
    let tmp = tempfile::tempdir().unwrap();
    let out = cli(&tmp)
        .args(["cache", "info", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert!(parsed["total_bytes"].is_u64());
    assert!(parsed["root"].is_string());
}

#[test]
fn cache_clear_empties_and_recreates_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let merged = tmp.path().join("cache").join("merged");

    // Seed the cache root, then plant a stale entry.
    cli(&tmp).args(["cache", "info"]).assert().success();
    std::fs::write(merged.join("merged_deadbeefdeadbeef.gguf"), b"stale").unwrap();

    cli(&tmp)
        .args(["cache", "clear", "--merged"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache cleared."));

    assert!(merged.exists());
    assert_eq!(std::fs::read_dir(&merged).unwrap().count(), 0);
}

#[test]
fn unsupported_architecture_is_rejected_with_the_supported_list() {
    let tmp = tempfile::tempdir().unwrap();
    cli(&tmp)
        .args([
            "setup",
            "--model-source",
            "some-model.gguf",
            "--architecture",
            "starcoder",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(
            predicate::str::contains("unsupported architecture")
                .and(predicate::str::contains("llama3"))
                .and(predicate::str::contains("nemotron")),
        );
}

#[test]
fn setup_with_a_missing_local_file_fails_cleanly() {
    let tmp = tempfile::tempdir().unwrap();
    cli(&tmp)
        .args(["setup", "--model-source", "./definitely-not-here.gguf"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error:"));
}
