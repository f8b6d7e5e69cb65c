//! Rate limiting algorithms.
//!
//! Each algorithm validates its parameters locally, then delegates the
//! entire decision to one atomic script execution against the shared
//! store. Store unavailability fails open here; every other store error
//! propagates.

pub mod sliding_window;
pub mod token_bucket;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds. The token bucket needs sub-second
/// precision so fractional refills at high rates are not lost.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Current Unix time in seconds. Second precision is enough for the
/// sliding window log.
pub(crate) fn now_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
