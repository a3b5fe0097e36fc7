//! Provider status endpoint

use axum::extract::State;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::types::Json;
use crate::domain::provider::ProviderStatus;

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    /// Provider hoisted to the head of the fallback order, if configured
    pub active_provider: Option<String>,
    pub providers: Vec<ProviderStatus>,
}

/// GET /v1/providers
pub async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let registry = state.registry();

    Json(ProvidersResponse {
        active_provider: registry.active_provider().map(str::to_string),
        providers: registry.status().await,
    })
}
