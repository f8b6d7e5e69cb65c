use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::error::Error;
use crate::limiter::Limiter;
use crate::metrics::Metrics;
use crate::store::AtomicStore;
use crate::validation;

/// Shared application state. Everything inside is already concurrency-safe,
/// so handlers clone the `Arc` and go.
pub struct AppState {
    pub limiter: Limiter,
    pub store: Arc<dyn AtomicStore>,
    pub metrics: Arc<Metrics>,
}

pub type SharedState = Arc<AppState>;

/// Incoming rate limit check. Fields default so that missing values reach
/// validation (which owns the caller-facing messages) instead of dying in
/// deserialization.
#[derive(Debug, Default, Deserialize)]
pub struct CheckPayload {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub algorithm: String,
    #[serde(default)]
    pub capacity: i64,
    pub refill_rate: Option<f64>,
    pub window_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CheckReply {
    pub allowed: bool,
    pub remaining: i64,
}

/// POST /check. The hot path.
pub async fn check(
    State(state): State<SharedState>,
    payload: Result<Json<CheckPayload>, JsonRejection>,
) -> Result<Json<CheckReply>, Error> {
    let Json(payload) =
        payload.map_err(|_| Error::Validation("invalid request body".to_string()))?;

    let request = validation::validate_check(&payload)?;
    let result = state.limiter.check(request).await?;

    Ok(Json(CheckReply {
        allowed: result.allowed,
        remaining: result.remaining,
    }))
}

/// GET /health. 200 when the store answers a ping, 503 otherwise. The
/// service keeps serving (fail-open) either way; this is for orchestration.
pub async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "healthy" }))),
        Err(err) => {
            warn!(error = %err, "health probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "error": "redis connection failed",
                })),
            )
        }
    }
}

/// GET /metrics. Prometheus text exposition.
pub async fn metrics(State(state): State<SharedState>) -> Result<impl IntoResponse, Error> {
    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
