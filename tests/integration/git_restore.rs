use docdeps::cache::{GitSlotPool, SlotPool};
use docdeps::git::{checkout_into, head_commit, resolve_branch_head};
use docdeps::test_utils::{TestRepo, git_available};
use std::time::Duration;
use tempfile::TempDir;

fn docs_repo(temp: &TempDir) -> TestRepo {
    let repo = TestRepo::init(temp.path().join("docs")).unwrap();
    repo.commit_file("index.md", "# Welcome\n", "Initial docs").unwrap();
    repo
}

#[tokio::test]
async fn test_resolve_branch_head_matches_repository() {
    if !git_available() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let repo = docs_repo(&temp);

    let head = resolve_branch_head(&repo.url(), "main").await.unwrap();
    assert_eq!(head, repo.head().unwrap());

    let err = resolve_branch_head(&repo.url(), "no-such-branch").await.unwrap_err();
    assert!(err.to_string().contains("no-such-branch"));
}

#[tokio::test]
async fn test_restore_into_slot_and_build_from_it() {
    if !git_available() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let repo = docs_repo(&temp);
    let commit = repo.head().unwrap();
    let pool = GitSlotPool::new(temp.path().join("cache"));

    let lease = pool.acquire_for_restore(&repo.url(), "main", &commit).await.unwrap();
    checkout_into(lease.path(), &repo.url(), "main", &commit).await.unwrap();
    pool.release(lease, true).await.unwrap();

    let lease = pool.acquire_for_build(&repo.url(), "main", Some(&commit)).await.unwrap();
    assert_eq!(std::fs::read_to_string(lease.path().join("index.md")).unwrap(), "# Welcome\n");
    assert_eq!(head_commit(lease.path()).await.unwrap(), commit);
    pool.release(lease, true).await.unwrap();
}

#[tokio::test]
async fn test_reused_slot_is_updated_in_place() {
    if !git_available() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let repo = docs_repo(&temp);
    let first = repo.head().unwrap();
    let pool = GitSlotPool::with_pool(
        SlotPool::new(temp.path().join("cache")).with_lockdown_window(Duration::ZERO),
    );

    let lease = pool.acquire_for_restore(&repo.url(), "main", &first).await.unwrap();
    checkout_into(lease.path(), &repo.url(), "main", &first).await.unwrap();
    std::fs::write(lease.path().join("build-output.html"), "stale").unwrap();
    pool.release(lease, true).await.unwrap();

    let second = repo.commit_file("guide/setup.md", "Setup\n", "Add setup guide").unwrap();
    let lease = pool.acquire_for_restore(&repo.url(), "main", &second).await.unwrap();
    assert_eq!(lease.slot_id(), 1);
    assert_eq!(lease.previous_version().map(|v| v.commit.as_str()), Some(first.as_str()));
    checkout_into(lease.path(), &repo.url(), "main", &second).await.unwrap();

    assert!(lease.path().join("guide/setup.md").exists());
    assert!(!lease.path().join("build-output.html").exists());
    assert_eq!(head_commit(lease.path()).await.unwrap(), second);
    pool.release(lease, true).await.unwrap();
}

#[tokio::test]
async fn test_failed_checkout_leaves_slot_unrestored() {
    if !git_available() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let repo = docs_repo(&temp);
    let pool = GitSlotPool::new(temp.path().join("cache"));
    let bogus = "0123456789abcdef0123456789abcdef01234567";

    let lease = pool.acquire_for_restore(&repo.url(), "main", bogus).await.unwrap();
    let result = checkout_into(lease.path(), &repo.url(), "main", bogus).await;
    assert!(result.is_err());
    pool.release(lease, result.is_ok()).await.unwrap();

    let err = pool.acquire_for_build(&repo.url(), "main", None).await.unwrap_err();
    assert!(err.needs_restore());
}

#[tokio::test]
async fn test_branches_are_selected_independently() {
    if !git_available() {
        return;
    }
    let temp = TempDir::new().unwrap();
    let repo = docs_repo(&temp);
    let main_commit = repo.head().unwrap();
    repo.create_branch("release").unwrap();
    let release_commit = repo.commit_file("index.md", "# Release\n", "Release notes").unwrap();
    repo.checkout("main").unwrap();

    let pool = GitSlotPool::new(temp.path().join("cache"));
    for (branch, commit) in [("main", &main_commit), ("release", &release_commit)] {
        let lease = pool.acquire_for_restore(&repo.url(), branch, commit).await.unwrap();
        checkout_into(lease.path(), &repo.url(), branch, commit).await.unwrap();
        pool.release(lease, true).await.unwrap();
    }

    let lease = pool.acquire_for_build(&repo.url(), "release", None).await.unwrap();
    assert_eq!(std::fs::read_to_string(lease.path().join("index.md")).unwrap(), "# Release\n");
    pool.release(lease, true).await.unwrap();

    let lease = pool.acquire_for_build(&repo.url(), "main", None).await.unwrap();
    assert_eq!(std::fs::read_to_string(lease.path().join("index.md")).unwrap(), "# Welcome\n");
    pool.release(lease, true).await.unwrap();
}
