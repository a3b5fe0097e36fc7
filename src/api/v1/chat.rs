//! Chat endpoint handler

use axum::extract::State;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::state::AppState;
use crate::api::types::{ApiError, ChatRequest, ChatResponse, Json};

/// POST /v1/chat
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let request_id = Uuid::new_v4();

    request
        .validate()
        .map_err(|message| ApiError::bad_request(message).with_param("customer_question"))?;

    info!(
        request_id = %request_id,
        session_id = request.session_id.as_deref().unwrap_or(""),
        use_rag = request.use_rag,
        provider = request.provider.as_deref().unwrap_or("auto"),
        "Processing chat request"
    );

    let result = state
        .orchestrator()
        .generate(request.into_generation_request())
        .await
        .map_err(|e| {
            warn!(request_id = %request_id, error = %e, "Chat request failed");
            ApiError::from(e)
        })?;

    info!(
        request_id = %request_id,
        provider = %result.provider_used,
        latency_ms = result.latency_ms,
        sources = result.sources.len(),
        "Chat request answered"
    );

    Ok(Json(ChatResponse::from(result)))
}
