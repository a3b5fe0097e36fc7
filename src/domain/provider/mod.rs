//! Configured providers and the registry that orders them per request

mod config;
mod registry;

pub use config::{ProviderConfig, ProviderEntry};
pub use registry::{CandidateSelection, ProviderRegistry, ProviderStatus};
