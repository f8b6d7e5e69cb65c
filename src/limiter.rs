use std::str::FromStr;
use std::sync::Arc;

use crate::algorithms::sliding_window::SlidingWindowLimiter;
use crate::algorithms::token_bucket::TokenBucketLimiter;
use crate::error::Error;
use crate::metrics::Metrics;
use crate::store::AtomicStore;

/// Admission algorithms supported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    TokenBucket,
    SlidingWindow,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::TokenBucket => "token_bucket",
            Algorithm::SlidingWindow => "sliding_window",
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "token_bucket" => Ok(Algorithm::TokenBucket),
            "sliding_window" => Ok(Algorithm::SlidingWindow),
            _ => Err(Error::Validation(
                "algorithm must be 'token_bucket' or 'sliding_window'".to_string(),
            )),
        }
    }
}

/// One normalized rate-limit check. `refill_rate` applies to the token
/// bucket, `window_seconds` to the sliding window; the one the algorithm
/// does not use is ignored.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub key: String,
    pub algorithm: Algorithm,
    pub capacity: i64,
    pub refill_rate: Option<f64>,
    pub window_seconds: Option<i64>,
}

/// Outcome of a check. `remaining` is the algorithm's estimate of spare
/// capacity after this request took effect; it is advisory, not a promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckResult {
    pub allowed: bool,
    pub remaining: i64,
}

/// Routes checks to the matching algorithm. Pure dispatch: no
/// algorithm-specific logic lives here, and no state beyond the two
/// algorithm handles.
pub struct Limiter {
    token_bucket: TokenBucketLimiter,
    sliding_window: SlidingWindowLimiter,
}

impl Limiter {
    pub fn new(store: Arc<dyn AtomicStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            token_bucket: TokenBucketLimiter::new(store.clone(), metrics.clone()),
            sliding_window: SlidingWindowLimiter::new(store, metrics),
        }
    }

    /// Main entry point for rate-limiting decisions.
    pub async fn check(&self, request: CheckRequest) -> Result<CheckResult, Error> {
        if request.key.is_empty() {
            return Err(Error::Validation("key is required".to_string()));
        }

        match request.algorithm {
            Algorithm::TokenBucket => {
                let refill_rate = request.refill_rate.ok_or_else(|| {
                    Error::Validation(
                        "refill_rate must be positive for token_bucket".to_string(),
                    )
                })?;
                self.token_bucket
                    .check(&request.key, request.capacity, refill_rate)
                    .await
            }
            Algorithm::SlidingWindow => {
                let window_seconds = request.window_seconds.ok_or_else(|| {
                    Error::Validation(
                        "window_seconds must be positive for sliding_window".to_string(),
                    )
                })?;
                self.sliding_window
                    .check(&request.key, request.capacity, window_seconds)
                    .await
            }
        }
    }
}
