pub mod chat;
pub mod config;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router. There is no protected/public split here —
/// authentication is out of scope for this surface.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/health", get(config::health))
        .route("/chat/stream", post(chat::chat_stream))
        .route("/config/agents", get(config::list_agents))
        .route("/config/providers", get(config::list_providers))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
