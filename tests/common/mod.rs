//! Shared test double for the atomic store.

use async_trait::async_trait;
use limitd::store::{AtomicScript, AtomicStore, StoreError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    /// Token bucket state per key: (tokens, last refill in millis).
    buckets: HashMap<String, (f64, i64)>,
    /// Sliding window log per key: (timestamp seconds, sequence).
    windows: HashMap<String, Vec<(i64, u64)>>,
    sequences: HashMap<String, u64>,
}

/// In-memory [`AtomicStore`] that replays the semantics of the two Lua
/// scripts under a single async mutex, which gives the same per-key
/// serialization guarantee Redis gives EVAL. An optional hold keeps the
/// lock across an await point so interleaving bugs would actually surface,
/// and `set_unavailable` simulates an outage for fail-open tests.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    hold: Duration,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_hold(Duration::ZERO)
    }

    pub fn with_hold(hold: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            hold,
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn parse(args: &[String]) -> (i64, f64, i64) {
        let capacity = args[0].parse().expect("capacity arg");
        let rate_or_window = args[1].parse().expect("rate/window arg");
        let now = args[2].parse().expect("now arg");
        (capacity, rate_or_window, now)
    }
}

#[async_trait]
impl AtomicStore for MemoryStore {
    async fn execute(
        &self,
        script: AtomicScript,
        key: &str,
        args: &[String],
    ) -> Result<Vec<i64>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }

        let mut inner = self.inner.lock().await;
        if !self.hold.is_zero() {
            // Holding the lock across an await point widens the race window
            // for any check that wrongly runs outside the atomic step.
            tokio::time::sleep(self.hold).await;
        }

        match script {
            AtomicScript::TokenBucket => {
                let (capacity, refill_rate, now) = Self::parse(args);

                let bucket = inner
                    .buckets
                    .entry(key.to_string())
                    .or_insert((capacity as f64, now));
                let elapsed_seconds = (now - bucket.1) as f64 / 1000.0;
                bucket.0 = (bucket.0 + elapsed_seconds * refill_rate).min(capacity as f64);
                bucket.1 = now;

                let mut allowed = 0;
                if bucket.0 >= 1.0 {
                    bucket.0 -= 1.0;
                    allowed = 1;
                }

                Ok(vec![allowed, bucket.0.floor() as i64])
            }
            AtomicScript::SlidingWindow => {
                let (capacity, window, now) = Self::parse(args);
                let window = window as i64;
                let window_start = now - window;

                let current_count = {
                    let entries = inner.windows.entry(key.to_string()).or_default();
                    entries.retain(|(ts, _)| *ts > window_start);
                    entries.len() as i64
                };

                let mut allowed = 0;
                let mut remaining = capacity - current_count;

                if current_count < capacity {
                    let seq = inner.sequences.entry(key.to_string()).or_insert(0);
                    *seq += 1;
                    let seq = *seq;
                    inner
                        .windows
                        .get_mut(key)
                        .expect("window entry just created")
                        .push((now, seq));
                    allowed = 1;
                    remaining -= 1;
                }

                Ok(vec![allowed, remaining.max(0)])
            }
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}
