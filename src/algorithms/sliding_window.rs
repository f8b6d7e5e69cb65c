use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use super::now_seconds;
use crate::error::Error;
use crate::limiter::CheckResult;
use crate::metrics::Metrics;
use crate::store::{AtomicScript, AtomicStore, StoreError};

const ALGORITHM: &str = "sliding_window";
const KEY_PREFIX: &str = "limitd:sliding_window:";

/// Sliding window log admission: at most `capacity` requests within any
/// trailing `window_seconds` interval. Counting real timestamps instead of
/// fixed buckets closes the boundary exploit where a caller bursts twice
/// the limit by straddling two adjacent windows.
pub struct SlidingWindowLimiter {
    store: Arc<dyn AtomicStore>,
    metrics: Arc<Metrics>,
}

impl SlidingWindowLimiter {
    pub fn new(store: Arc<dyn AtomicStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    pub async fn check(
        &self,
        key: &str,
        capacity: i64,
        window_seconds: i64,
    ) -> Result<CheckResult, Error> {
        let started = Instant::now();
        let result = self.run_check(key, capacity, window_seconds).await;
        self.metrics
            .check_latency
            .with_label_values(&[ALGORITHM])
            .observe(started.elapsed().as_secs_f64() * 1000.0);
        result
    }

    async fn run_check(
        &self,
        key: &str,
        capacity: i64,
        window_seconds: i64,
    ) -> Result<CheckResult, Error> {
        if capacity <= 0 || window_seconds <= 0 {
            return Err(Error::Validation(
                "capacity and window_seconds must be positive".to_string(),
            ));
        }

        let now = now_seconds();
        let storage_key = format!("{KEY_PREFIX}{key}");
        let args = [
            capacity.to_string(),
            window_seconds.to_string(),
            now.to_string(),
        ];

        let store_started = Instant::now();
        let reply = self
            .store
            .execute(AtomicScript::SlidingWindow, &storage_key, &args)
            .await;
        self.metrics
            .store_latency
            .observe(store_started.elapsed().as_secs_f64() * 1000.0);

        let reply = match reply {
            Ok(reply) => reply,
            Err(StoreError::Unavailable(cause)) => {
                warn!(key, %cause, "store unavailable, failing open");
                self.metrics.store_errors.inc();
                return Ok(CheckResult {
                    allowed: true,
                    remaining: 0,
                });
            }
            Err(StoreError::Other(cause)) => {
                return Err(Error::Store(format!(
                    "sliding window check failed: {cause}"
                )));
            }
        };

        if reply.len() != 2 {
            return Err(Error::Store(
                "unexpected reply shape from sliding window script".to_string(),
            ));
        }

        let allowed = reply[0] == 1;
        let remaining = reply[1];

        if allowed {
            self.metrics
                .requests_allowed
                .with_label_values(&[ALGORITHM])
                .inc();
        } else {
            self.metrics
                .requests_blocked
                .with_label_values(&[ALGORITHM])
                .inc();
        }

        Ok(CheckResult { allowed, remaining })
    }
}
