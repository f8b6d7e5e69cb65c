use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use super::now_millis;
use crate::error::Error;
use crate::limiter::CheckResult;
use crate::metrics::Metrics;
use crate::store::{AtomicScript, AtomicStore, StoreError};

const ALGORITHM: &str = "token_bucket";
const KEY_PREFIX: &str = "limitd:token_bucket:";

/// Token bucket admission: bursts up to `capacity`, continuous refill at
/// `refill_rate` tokens per second. The whole read-refill-consume-persist
/// sequence runs inside one atomic script execution.
pub struct TokenBucketLimiter {
    store: Arc<dyn AtomicStore>,
    metrics: Arc<Metrics>,
}

impl TokenBucketLimiter {
    pub fn new(store: Arc<dyn AtomicStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    pub async fn check(
        &self,
        key: &str,
        capacity: i64,
        refill_rate: f64,
    ) -> Result<CheckResult, Error> {
        let started = Instant::now();
        let result = self.run_check(key, capacity, refill_rate).await;
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
        refill_rate: f64,
    ) -> Result<CheckResult, Error> {
        if capacity <= 0 || refill_rate <= 0.0 {
            return Err(Error::Validation(
                "capacity and refill_rate must be positive".to_string(),
            ));
        }

        let now = now_millis();
        let storage_key = format!("{KEY_PREFIX}{key}");
        let args = [
            capacity.to_string(),
            refill_rate.to_string(),
            now.to_string(),
        ];

        let store_started = Instant::now();
        let reply = self
            .store
            .execute(AtomicScript::TokenBucket, &storage_key, &args)
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
                return Err(Error::Store(format!("token bucket check failed: {cause}")));
            }
        };

        if reply.len() != 2 {
            return Err(Error::Store(
                "unexpected reply shape from token bucket script".to_string(),
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
