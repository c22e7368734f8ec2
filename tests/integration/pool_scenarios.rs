use docdeps::cache::{GitSlotPool, GitVersion, SlotPool};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const URL: &str = "https://example/repo";

/// A pool as a separate process would open it.
fn process_pool(root: &Path) -> GitSlotPool {
    GitSlotPool::new(root)
}

fn process_pool_with_window(root: &Path, window: Duration) -> GitSlotPool {
    GitSlotPool::with_pool(SlotPool::new(root).with_lockdown_window(window))
}

#[tokio::test]
async fn test_restore_then_build_across_processes() {
    docdeps::test_utils::init_test_logging(None);
    let temp = TempDir::new().unwrap();

    let restorer = process_pool(temp.path());
    let lease = restorer.acquire_for_restore(URL, "main", "abc123").await.unwrap();
    assert_eq!(lease.slot_id(), 1);
    let slot_dir = lease.path().to_path_buf();
    restorer.release(lease, true).await.unwrap();

    let builder = process_pool(temp.path());
    let lease = builder.acquire_for_build(URL, "main", Some("abc123")).await.unwrap();
    assert_eq!(lease.slot_id(), 1);
    assert_eq!(lease.path(), slot_dir);
    builder.release(lease, true).await.unwrap();

    let err = builder.acquire_for_build(URL, "main", Some("def456")).await.unwrap_err();
    assert!(err.needs_restore());
}

#[tokio::test]
async fn test_exclusive_blocks_shared_in_other_process() {
    let temp = TempDir::new().unwrap();
    let window = Duration::ZERO;

    let first = process_pool_with_window(temp.path(), window);
    let lease = first.acquire_for_restore(URL, "main", "abc123").await.unwrap();
    first.release(lease, true).await.unwrap();

    // Another process reclaims the idle slot to restore a new commit
    let second = process_pool_with_window(temp.path(), window);
    let writer = second.acquire_for_restore(URL, "main", "def456").await.unwrap();
    assert_eq!(writer.slot_id(), 1);

    // The old content is gone from the registry and the new one is not published
    let reader = process_pool(temp.path());
    assert!(reader.acquire_for_build(URL, "main", Some("abc123")).await.unwrap_err().needs_restore());
    assert!(reader.acquire_for_build(URL, "main", Some("def456")).await.unwrap_err().needs_restore());
    assert!(reader.acquire_for_build(URL, "main", None).await.unwrap_err().needs_restore());

    second.release(writer, true).await.unwrap();
    let lease = reader.acquire_for_build(URL, "main", None).await.unwrap();
    assert_eq!(lease.version(), &GitVersion::new("main", "def456"));
    reader.release(lease, true).await.unwrap();
}

#[tokio::test]
async fn test_crashed_restore_gets_new_slot_inside_window() {
    let temp = TempDir::new().unwrap();

    let first = process_pool(temp.path());
    let lease = first.acquire_for_restore(URL, "main", "abc123").await.unwrap();
    first.release(lease, true).await.unwrap();

    let crashing = process_pool(temp.path());
    let lease = crashing.acquire_for_restore(URL, "main", "def456").await.unwrap();
    assert_eq!(lease.slot_id(), 2);
    drop(lease);
    drop(crashing);

    let next = process_pool(temp.path());
    let lease = next.acquire_for_restore(URL, "main", "def456").await.unwrap();
    assert_eq!(lease.slot_id(), 3);
    next.release(lease, true).await.unwrap();

    let slots = next.slots(URL).await.unwrap();
    let crashed = slots.iter().find(|s| s.id == 2).unwrap();
    assert!(!crashed.restored);
    assert!(crashed.acquirer.is_some());
}

#[tokio::test]
async fn test_crashed_restore_slot_is_reclaimed() {
    let temp = TempDir::new().unwrap();
    let window = Duration::ZERO;

    let first = process_pool_with_window(temp.path(), window);
    let lease = first.acquire_for_restore(URL, "main", "abc123").await.unwrap();
    first.release(lease, true).await.unwrap();

    // A build keeps slot 1 busy
    let builder = process_pool(temp.path());
    let reading = builder.acquire_for_build(URL, "main", Some("abc123")).await.unwrap();

    let crashing = process_pool_with_window(temp.path(), window);
    let lease = crashing.acquire_for_restore(URL, "main", "def456").await.unwrap();
    assert_eq!(lease.slot_id(), 2);
    drop(lease);
    drop(crashing);

    // Half-written content is never served
    assert!(builder.acquire_for_build(URL, "main", Some("def456")).await.unwrap_err().needs_restore());

    let retry = process_pool_with_window(temp.path(), window);
    let lease = retry.acquire_for_restore(URL, "main", "def456").await.unwrap();
    assert_eq!(lease.slot_id(), 2);
    assert_eq!(lease.previous_version(), Some(&GitVersion::new("main", "def456")));
    retry.release(lease, true).await.unwrap();

    let lease = builder.acquire_for_build(URL, "main", Some("def456")).await.unwrap();
    assert_eq!(lease.slot_id(), 2);
    builder.release(lease, true).await.unwrap();
    builder.release(reading, true).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_restores_never_share_a_slot() {
    let temp = TempDir::new().unwrap();
    let held: Arc<Mutex<HashSet<u32>>> = Arc::new(Mutex::new(HashSet::new()));
    let mut handles = Vec::new();

    for worker in 0..6 {
        let root = temp.path().to_path_buf();
        let held = Arc::clone(&held);
        handles.push(tokio::spawn(async move {
            let pool = process_pool_with_window(&root, Duration::ZERO);
            for round in 0..5 {
                let commit = format!("w{worker}r{round}");
                let lease = pool
                    .acquire_for_restore_with_retry(URL, "main", &commit, Duration::from_secs(30))
                    .await
                    .unwrap();
                let id = lease.slot_id();
                assert!(held.lock().unwrap().insert(id), "slot {id} leased twice");

                std::fs::write(lease.path().join("commit.txt"), &commit).unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
                assert_eq!(std::fs::read_to_string(lease.path().join("commit.txt")).unwrap(), commit);

                held.lock().unwrap().remove(&id);
                pool.release(lease, true).await.unwrap();
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let slots = process_pool(temp.path()).slots(URL).await.unwrap();
    assert!(!slots.is_empty() && slots.len() <= 6);
    assert!(slots.iter().all(|s| s.restored && s.acquirer.is_none()));
    let ids: HashSet<u32> = slots.iter().map(|s| s.id).collect();
    assert_eq!(ids.len(), slots.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reader_never_sees_unpublished_content() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().to_path_buf();

    let writer = tokio::spawn({
        let root = root.clone();
        async move {
            let pool = process_pool(&root);
            let lease = pool.acquire_for_restore(URL, "main", "abc123").await.unwrap();
            for part in 0..5 {
                std::fs::write(lease.path().join(format!("part{part}.md")), "content").unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            std::fs::write(lease.path().join("complete"), "").unwrap();
            pool.release(lease, true).await.unwrap();
        }
    });

    let pool = process_pool(&root);
    let lease = loop {
        match pool.acquire_for_build(URL, "main", Some("abc123")).await {
            Ok(lease) => break lease,
            Err(e) if e.needs_restore() => tokio::time::sleep(Duration::from_millis(5)).await,
            Err(e) => panic!("unexpected error: {e}"),
        }
    };
    assert!(lease.path().join("complete").exists());
    assert!(lease.path().join("part4.md").exists());
    pool.release(lease, true).await.unwrap();
    writer.await.unwrap();
}

#[tokio::test]
async fn test_corrupt_registry_self_heals() {
    let temp = TempDir::new().unwrap();
    let pool = process_pool(temp.path());

    let lease = pool.acquire_for_restore(URL, "main", "abc123").await.unwrap();
    pool.release(lease, true).await.unwrap();

    let remote = docdeps::cache::RemoteIdentity::from_url(URL).unwrap();
    let index = temp.path().join(remote.name()).join("index.json");
    std::fs::write(&index, "[{\"id\": ").unwrap();

    // Treated as empty: builds need a restore, restores start over at slot 1
    assert!(pool.acquire_for_build(URL, "main", Some("abc123")).await.unwrap_err().needs_restore());
    let lease = pool.acquire_for_restore(URL, "main", "abc123").await.unwrap();
    assert_eq!(lease.slot_id(), 1);
    pool.release(lease, true).await.unwrap();

    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&index).unwrap()).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 1);
    assert_eq!(parsed[0]["restored"], true);
    assert_eq!(parsed[0]["commit"], "abc123");
}
