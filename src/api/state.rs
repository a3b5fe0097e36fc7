//! Application state for shared services

use std::sync::Arc;

use crate::Services;
use crate::domain::{GenerationOrchestrator, ProviderRegistry};

/// State shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub services: Services,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    pub fn orchestrator(&self) -> &Arc<GenerationOrchestrator> {
        &self.services.orchestrator
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        self.services.registry()
    }
}
