//! Knowledge base retrieval endpoint

use std::time::Instant;

use axum::extract::State;
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, MAX_QUESTION_CHARS, RagQuery, RagResult};

/// POST /v1/rag/retrieve
pub async fn retrieve(
    State(state): State<AppState>,
    Json(request): Json<RagQuery>,
) -> Result<Json<RagResult>, ApiError> {
    if request.query.chars().count() > MAX_QUESTION_CHARS {
        return Err(ApiError::bad_request(format!(
            "query exceeds {} characters",
            MAX_QUESTION_CHARS
        ))
        .with_param("query"));
    }

    let start = Instant::now();
    let results = state
        .orchestrator()
        .retrieve(
            &request.query,
            request.top_k,
            request.similarity_threshold,
            request.category,
        )
        .await?;
    let retrieval_time_ms = start.elapsed().as_millis() as u64;

    debug!(results = results.len(), retrieval_time_ms, "Retrieval completed");

    Ok(Json(RagResult {
        results,
        retrieval_time_ms,
    }))
}
