//! Health check endpoint.
//!
//! Returns 200 OK ("degraded" when some catalogs failed to load),
//! 503 Service Unavailable when every catalog failed.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    catalogs: usize,
    loaded: usize,
    failed: usize,
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let summaries = state.catalogs().list();
    let catalogs = summaries.len();
    let failed = summaries.iter().filter(|s| s.load_error.is_some()).count();
    let loaded = summaries.iter().filter(|s| s.records > 0).count();

    let (status, status_code) = if failed == 0 {
        ("healthy", StatusCode::OK)
    } else if failed < catalogs {
        ("degraded", StatusCode::OK)
    } else {
        ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            catalogs,
            loaded,
            failed,
        }),
    )
}

/// Create the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
