use assert_cmd::Command;
use docdeps::cache::GitSlotPool;
use docdeps::test_utils::{TestRepo, git_available};
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const URL: &str = "https://example/repo";

/// `docdeps` with storage and config isolated under `temp`.
fn docdeps(temp: &Path) -> Command {
    let mut cmd = Command::cargo_bin("docdeps").unwrap();
    cmd.env("DOCDEPS_CACHE_DIR", temp.join("cache"))
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .arg("--config")
        .arg(temp.join("config.toml"));
    cmd
}

/// Publish a slot for `commit` without touching git.
async fn publish(temp: &Path, commit: &str) -> std::path::PathBuf {
    let pool = GitSlotPool::new(temp.join("cache"));
    let lease = pool.acquire_for_restore(URL, "main", commit).await.unwrap();
    let dir = lease.path().to_path_buf();
    std::fs::write(dir.join("index.md"), "# Docs\n").unwrap();
    pool.release(lease, true).await.unwrap();
    dir
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("docdeps")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("restore"))
        .stdout(predicate::str::contains("exec"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn test_list_empty_remote() {
    let temp = TempDir::new().unwrap();
    docdeps(temp.path())
        .args(["list", URL])
        .assert()
        .success()
        .stdout(predicate::str::contains("No slots recorded"));
}

#[test]
fn test_path_without_restore_suggests_restore() {
    let temp = TempDir::new().unwrap();
    docdeps(temp.path())
        .args(["path", URL, "--branch", "main", "--commit", "abc123"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("main@abc123"))
        .stderr(predicate::str::contains("docdeps restore"));
}

#[tokio::test]
async fn test_path_and_list_after_publish() {
    let temp = TempDir::new().unwrap();
    let dir = publish(temp.path(), "abc123").await;

    docdeps(temp.path())
        .args(["path", URL, "--branch", "main", "--commit", "abc123"])
        .assert()
        .success()
        .stdout(predicate::str::contains(dir.display().to_string()));

    let output = docdeps(temp.path()).args(["list", URL, "--format", "json"]).output().unwrap();
    assert!(output.status.success());
    let slots: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(slots[0]["id"], 1);
    assert_eq!(slots[0]["branch"], "main");
    assert_eq!(slots[0]["commit"], "abc123");
    assert_eq!(slots[0]["restored"], true);

    docdeps(temp.path())
        .args(["list", URL])
        .assert()
        .success()
        .stdout(predicate::str::contains("restored"))
        .stdout(predicate::str::contains("abc123"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_exec_runs_in_slot_and_propagates_exit_code() {
    let temp = TempDir::new().unwrap();
    let dir = publish(temp.path(), "abc123").await;

    docdeps(temp.path())
        .args(["exec", URL, "--branch", "main", "--", "sh", "-c", "cat index.md; echo $DOCDEPS_SLOT_DIR"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Docs"))
        .stdout(predicate::str::contains(dir.display().to_string()));

    docdeps(temp.path())
        .args(["exec", URL, "--branch", "main", "--", "sh", "-c", "exit 3"])
        .assert()
        .code(3);

    // The shared lease was released: the slot can be reclaimed again
    let slots = GitSlotPool::new(temp.path().join("cache")).slots(URL).await.unwrap();
    assert!(slots[0].acquirer.is_none());
}

#[test]
fn test_exec_requires_command() {
    let temp = TempDir::new().unwrap();
    docdeps(temp.path()).args(["exec", URL, "--branch", "main"]).assert().failure();
}

#[test]
fn test_invalid_config_is_reported() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("config.toml"), "lockdown_window_secs = \"ten\"").unwrap();

    docdeps(temp.path())
        .args(["list", URL])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config"));
}

#[test]
fn test_restore_exec_from_local_repository() {
    if !git_available() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let repo = TestRepo::init(temp.path().join("docs")).unwrap();
    let commit = repo.commit_file("index.md", "# Handbook\n", "Initial").unwrap();

    docdeps(temp.path())
        .args(["restore", &repo.url(), "--branch", "main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored"))
        .stdout(predicate::str::contains(&commit[..12]));

    docdeps(temp.path())
        .args(["exec", &repo.url(), "--branch", "main", "--commit", &commit, "--", "git", "rev-parse", "HEAD"])
        .assert()
        .success()
        .stdout(predicate::str::contains(commit.as_str()));
}
