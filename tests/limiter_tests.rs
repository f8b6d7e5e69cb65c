mod common;

use common::MemoryStore;
use limitd::limiter::{Algorithm, CheckRequest, Limiter};
use limitd::metrics::Metrics;
use limitd::store::AtomicStore;
use std::sync::Arc;
use std::time::Duration;

fn setup(store: Arc<MemoryStore>) -> (Arc<Limiter>, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new().unwrap());
    let store: Arc<dyn AtomicStore> = store;
    (Arc::new(Limiter::new(store, metrics.clone())), metrics)
}

fn token_bucket(key: &str, capacity: i64, refill_rate: f64) -> CheckRequest {
    CheckRequest {
        key: key.to_string(),
        algorithm: Algorithm::TokenBucket,
        capacity,
        refill_rate: Some(refill_rate),
        window_seconds: None,
    }
}

fn sliding_window(key: &str, capacity: i64, window_seconds: i64) -> CheckRequest {
    CheckRequest {
        key: key.to_string(),
        algorithm: Algorithm::SlidingWindow,
        capacity,
        refill_rate: None,
        window_seconds: Some(window_seconds),
    }
}

#[tokio::test]
async fn token_bucket_burst_scenario() {
    let (limiter, _) = setup(Arc::new(MemoryStore::new()));

    // capacity 5, refill 1/s: seven rapid checks admit exactly five.
    let mut allowed = Vec::new();
    let mut remaining = Vec::new();
    for _ in 0..7 {
        let result = limiter
            .check(token_bucket("user:test1", 5, 1.0))
            .await
            .unwrap();
        allowed.push(result.allowed);
        remaining.push(result.remaining);
    }

    assert_eq!(allowed, [true, true, true, true, true, false, false]);
    assert_eq!(remaining, [4, 3, 2, 1, 0, 0, 0]);
}

#[tokio::test]
async fn token_bucket_refills_while_waiting() {
    let (limiter, _) = setup(Arc::new(MemoryStore::new()));

    for _ in 0..10 {
        let result = limiter.check(token_bucket("refill", 10, 10.0)).await.unwrap();
        assert!(result.allowed);
    }
    let drained = limiter.check(token_bucket("refill", 10, 10.0)).await.unwrap();
    assert!(!drained.allowed);

    // Half a second at 10 tokens/s buys roughly five tokens back.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let result = limiter.check(token_bucket("refill", 10, 10.0)).await.unwrap();
    assert!(result.allowed);
    assert!(result.remaining >= 4, "remaining = {}", result.remaining);
    assert!(result.remaining <= 9);

    // A long wait clamps at capacity rather than overshooting.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let result = limiter.check(token_bucket("refill", 10, 10.0)).await.unwrap();
    assert!(result.allowed);
    assert_eq!(result.remaining, 9);
}

#[tokio::test]
async fn sliding_window_enforces_capacity_within_window() {
    let (limiter, _) = setup(Arc::new(MemoryStore::new()));

    for expected_remaining in [2, 1, 0] {
        let result = limiter.check(sliding_window("sw", 3, 60)).await.unwrap();
        assert!(result.allowed);
        assert_eq!(result.remaining, expected_remaining);
    }

    let result = limiter.check(sliding_window("sw", 3, 60)).await.unwrap();
    assert!(!result.allowed);
    assert_eq!(result.remaining, 0);
}

/// Sleep until shortly after the next wall-clock second so that a burst of
/// checks lands inside one second-precision timestamp.
async fn align_to_second_boundary() {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap();
    let to_next = 1_000_000_000 - u64::from(now.subsec_nanos());
    tokio::time::sleep(Duration::from_nanos(to_next + 50_000_000)).await;
}

#[tokio::test]
async fn sliding_window_frees_capacity_after_expiry() {
    let (limiter, _) = setup(Arc::new(MemoryStore::new()));

    align_to_second_boundary().await;
    for _ in 0..2 {
        assert!(limiter.check(sliding_window("exp", 2, 2)).await.unwrap().allowed);
    }

    // Still inside the window: rejected.
    tokio::time::sleep(Duration::from_millis(1000)).await;
    let result = limiter.check(sliding_window("exp", 2, 2)).await.unwrap();
    assert!(!result.allowed);

    // Past the window: the old entries are purged and capacity is back.
    tokio::time::sleep(Duration::from_millis(2200)).await;
    let result = limiter.check(sliding_window("exp", 2, 2)).await.unwrap();
    assert!(result.allowed);
    assert_eq!(result.remaining, 1);
}

#[tokio::test]
async fn distinct_keys_are_fully_isolated() {
    let (limiter, _) = setup(Arc::new(MemoryStore::new()));

    for _ in 0..2 {
        assert!(limiter.check(token_bucket("tenant:a", 2, 0.001)).await.unwrap().allowed);
    }
    assert!(!limiter.check(token_bucket("tenant:a", 2, 0.001)).await.unwrap().allowed);

    let result = limiter.check(token_bucket("tenant:b", 2, 0.001)).await.unwrap();
    assert!(result.allowed);
    assert_eq!(result.remaining, 1);

    for _ in 0..3 {
        assert!(limiter.check(sliding_window("win:a", 3, 60)).await.unwrap().allowed);
    }
    assert!(!limiter.check(sliding_window("win:a", 3, 60)).await.unwrap().allowed);
    assert!(limiter.check(sliding_window("win:b", 3, 60)).await.unwrap().allowed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checks_never_overadmit() {
    // The store double sleeps while holding its lock, so any decision taken
    // outside the atomic step would interleave and drift the count.
    let (limiter, _) = setup(Arc::new(MemoryStore::with_hold(Duration::from_millis(2))));

    let mut tasks = Vec::new();
    for _ in 0..25 {
        let limiter = limiter.clone();
        tasks.push(tokio::spawn(async move {
            limiter
                .check(token_bucket("hot-key", 10, 0.001))
                .await
                .unwrap()
                .allowed
        }));
    }

    let mut admitted = 0;
    let mut blocked = 0;
    for task in tasks {
        if task.await.unwrap() {
            admitted += 1;
        } else {
            blocked += 1;
        }
    }

    assert_eq!(admitted, 10);
    assert_eq!(blocked, 15);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sliding_window_checks_never_overadmit() {
    let (limiter, _) = setup(Arc::new(MemoryStore::with_hold(Duration::from_millis(2))));

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let limiter = limiter.clone();
        tasks.push(tokio::spawn(async move {
            limiter
                .check(sliding_window("hot-window", 8, 60))
                .await
                .unwrap()
                .allowed
        }));
    }

    let mut admitted = 0;
    for task in tasks {
        if task.await.unwrap() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 8);
}

#[tokio::test]
async fn outage_fails_open_for_both_algorithms() {
    let store = Arc::new(MemoryStore::new());
    let (limiter, metrics) = setup(store.clone());
    store.set_unavailable(true);

    for request in [
        token_bucket("a", 5, 1.0),
        token_bucket("b", 1, 0.5),
        sliding_window("c", 3, 60),
        sliding_window("d", 100, 10),
    ] {
        let result = limiter.check(request).await.unwrap();
        assert!(result.allowed);
        assert_eq!(result.remaining, 0);
    }

    assert_eq!(metrics.store_errors.get(), 4);

    // Once the store recovers, decisions are enforced again.
    store.set_unavailable(false);
    let result = limiter.check(token_bucket("a", 1, 0.001)).await.unwrap();
    assert!(result.allowed);
    let result = limiter.check(token_bucket("a", 1, 0.001)).await.unwrap();
    assert!(!result.allowed);
}

#[tokio::test]
async fn allowed_and_blocked_counters_track_decisions() {
    let (limiter, metrics) = setup(Arc::new(MemoryStore::new()));

    for _ in 0..3 {
        limiter.check(token_bucket("m", 2, 0.001)).await.unwrap();
    }

    assert_eq!(
        metrics
            .requests_allowed
            .with_label_values(&["token_bucket"])
            .get(),
        2
    );
    assert_eq!(
        metrics
            .requests_blocked
            .with_label_values(&["token_bucket"])
            .get(),
        1
    );
}
