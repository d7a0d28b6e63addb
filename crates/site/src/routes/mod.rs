//! HTTP route handlers.

use axum::Router;

use crate::state::AppState;

pub mod catalog;
pub mod health;

/// All routes, bound to the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(catalog::router())
        .with_state(state)
}
