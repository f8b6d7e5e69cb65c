use crate::error::Error;
use crate::handlers::CheckPayload;
use crate::limiter::{Algorithm, CheckRequest};

/// Validate an incoming check payload and normalize it into a typed
/// request. Every rejection happens here, before the algorithms or the
/// store are touched, and the messages are part of the API contract.
pub fn validate_check(payload: &CheckPayload) -> Result<CheckRequest, Error> {
    if payload.key.is_empty() {
        return Err(Error::Validation("key is required".to_string()));
    }

    if payload.capacity <= 0 {
        return Err(Error::Validation("capacity must be positive".to_string()));
    }

    let algorithm: Algorithm = payload.algorithm.parse()?;

    match algorithm {
        Algorithm::TokenBucket => {
            if payload.refill_rate.map_or(true, |rate| rate <= 0.0) {
                return Err(Error::Validation(
                    "refill_rate must be positive for token_bucket".to_string(),
                ));
            }
        }
        Algorithm::SlidingWindow => {
            if payload.window_seconds.map_or(true, |window| window <= 0) {
                return Err(Error::Validation(
                    "window_seconds must be positive for sliding_window".to_string(),
                ));
            }
        }
    }

    Ok(CheckRequest {
        key: payload.key.clone(),
        algorithm,
        capacity: payload.capacity,
        refill_rate: payload.refill_rate,
        window_seconds: payload.window_seconds,
    })
}
