use pfjobs::JobQueue;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

#[tokio::test]
async fn test_duplicate_key_runs_once() {
    let queue = JobQueue::new(1);
    let runs = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());

    let first = {
        let runs = runs.clone();
        let gate = gate.clone();
        queue.enqueue("uuid-1", async move {
            gate.notified().await;
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };
    let second = {
        let runs = runs.clone();
        queue.enqueue("uuid-1", async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };

    assert!(first);
    assert!(!second);
    assert!(queue.is_inflight("uuid-1"));

    gate.notify_one();
    queue.wait_idle().await;

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(!queue.is_inflight("uuid-1"));
    assert_eq!(queue.stats().completed, 1);
}

#[tokio::test]
async fn test_key_can_be_requeued_after_completion() {
    let queue = JobQueue::new(1);
    let runs = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let runs = runs.clone();
        assert!(queue.enqueue("uuid-1", async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        queue.wait_idle().await;
    }

    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrency_limit() {
    let queue = JobQueue::new(2);
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for i in 0..6 {
        let current = current.clone();
        let peak = peak.clone();
        queue.enqueue(format!("uuid-{}", i), async move {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        });
    }

    assert!(queue.running() <= 2);
    queue.wait_idle().await;

    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(queue.stats().completed, 6);
}

#[tokio::test]
async fn test_failure_releases_key_and_does_not_block() {
    let queue = JobQueue::new(1);
    let runs = Arc::new(AtomicUsize::new(0));

    queue.enqueue("bad", async { Err(anyhow::anyhow!("export failed")) });
    {
        let runs = runs.clone();
        queue.enqueue("good", async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    queue.wait_idle().await;

    let stats = queue.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(!queue.is_inflight("bad"));
}

#[tokio::test]
async fn test_panic_releases_key() {
    let queue = JobQueue::new(1);

    queue.enqueue("boom", async { panic!("worker exploded") });
    queue.wait_idle().await;

    assert!(!queue.is_inflight("boom"));
    assert_eq!(queue.stats().failed, 1);
    assert!(queue.enqueue("boom", async { Ok(()) }));
    queue.wait_idle().await;
    assert_eq!(queue.stats().completed, 1);
}

#[tokio::test]
async fn test_pending_counts_queued_jobs() {
    let queue = JobQueue::new(1);
    let gate = Arc::new(Notify::new());

    {
        let gate = gate.clone();
        queue.enqueue("a", async move {
            gate.notified().await;
            Ok(())
        });
    }
    queue.enqueue("b", async { Ok(()) });
    queue.enqueue("c", async { Ok(()) });

    assert_eq!(queue.running(), 1);
    assert_eq!(queue.pending(), 2);

    gate.notify_one();
    queue.wait_idle().await;
    assert_eq!(queue.pending(), 0);
}
