use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Knowledge base error: {0}")]
    KnowledgeBase(String),

    #[error("Embedding error: {message}")]
    Embedding { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn knowledge_base(message: impl Into<String>) -> Self {
        Self::KnowledgeBase(message.into())
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Uniform failure classification shared by every backend adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The call did not complete within its time budget
    Timeout,
    /// The backend throttled the caller
    RateLimited,
    /// Backend unreachable or answering with a server-side error
    Unavailable,
    /// Credentials rejected
    Authentication,
    /// The backend rejected the request as malformed
    InvalidRequest,
    /// The backend (or adapter) cannot serve the requested capability
    Unsupported,
    /// The backend answered with a body the adapter could not interpret
    Malformed,
    /// The breaker refused admission; no call was made
    CircuitOpen,
}

impl ProviderErrorKind {
    /// Transient kinds are retried; everything else escalates immediately
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Timeout | Self::RateLimited | Self::Unavailable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Unavailable => "unavailable",
            Self::Authentication => "authentication",
            Self::InvalidRequest => "invalid_request",
            Self::Unsupported => "unsupported",
            Self::Malformed => "malformed",
            Self::CircuitOpen => "circuit_open",
        }
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a provider adapter, normalized across backends
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Provider error: {provider} ({kind}) - {message}")]
pub struct ProviderError {
    pub provider: String,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(
        provider: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Timeout, message)
    }

    pub fn unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Unavailable, message)
    }

    pub fn unsupported(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Unsupported, message)
    }

    pub fn malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Malformed, message)
    }

    /// Re-attribute an error raised by a shared transport to a named provider
    pub fn for_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}
