use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;
use crate::store::migrate;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .route("/database", get(database_health))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": state.uptime_secs(),
    }))
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Ready once migrations have been applied.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match migrate::get_current_version(state.store()) {
        Ok(version) if version > 0 => StatusCode::OK,
        Ok(_) => StatusCode::SERVICE_UNAVAILABLE,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub async fn database_health(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let healthy = state.store().get_deck("__health_check__").is_ok();
    let latency_us = start.elapsed().as_micros() as u64;

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(serde_json::json!({
            "healthy": healthy,
            "latencyUs": latency_us,
            "decks": state.store().decks.len(),
            "cards": state.store().cards.len(),
            "activeSessions": state.store().study_sessions.len(),
        })),
    )
}
