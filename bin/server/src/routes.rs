//! HTTP routes for the approval service.

pub mod approve;
pub mod inbound;

use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/approve", get(approve::approve))
        .route("/v1/inbound", post(inbound::inbound))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
