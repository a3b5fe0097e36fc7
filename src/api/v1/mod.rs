//! Versioned API endpoints

pub mod chat;
pub mod providers;
pub mod retrieval;

use axum::{
    Router,
    routing::{get, post},
};

use super::state::AppState;

pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat::chat))
        .route("/rag/retrieve", post(retrieval::retrieve))
        .route("/providers", get(providers::list_providers))
}
