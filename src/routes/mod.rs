//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The service exposes exactly two endpoints: a health probe and the
//! WebSocket chat endpoint. Everything else the original application had
//! (profiles, matching, auth) lives outside this service.

pub mod ws;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws::handle_ws))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
