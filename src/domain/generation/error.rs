use serde::Serialize;
use thiserror::Error;

use crate::domain::{DomainError, ProviderError, ProviderErrorKind};

/// Why one provider candidate did not produce the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptFailure {
    pub provider: String,
    pub kind: ProviderErrorKind,
    pub message: String,
    /// Calls actually sent to the backend for this candidate
    pub attempts: u32,
}

impl AttemptFailure {
    pub fn from_error(provider: &str, error: &ProviderError, attempts: u32) -> Self {
        Self {
            provider: provider.to_string(),
            kind: error.kind,
            message: error.message.clone(),
            attempts,
        }
    }

    pub fn circuit_open(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            kind: ProviderErrorKind::CircuitOpen,
            message: "circuit breaker is open".to_string(),
            attempts: 0,
        }
    }

    pub fn unsupported_tools(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            kind: ProviderErrorKind::Unsupported,
            message: "function calling is not supported by this provider".to_string(),
            attempts: 0,
        }
    }
}

fn describe(attempts: &[AttemptFailure]) -> String {
    if attempts.is_empty() {
        return "no provider was attempted".to_string();
    }

    attempts
        .iter()
        .map(|a| format!("{} ({}): {}", a.provider, a.kind, a.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// The only error that escapes the generation orchestrator
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(#[source] DomainError),

    #[error("Insufficient context: no knowledge base passage cleared the similarity threshold")]
    InsufficientContext,

    #[error("All providers exhausted: {}", describe(.attempts))]
    Exhausted { attempts: Vec<AttemptFailure> },

    #[error("Request deadline exceeded after {elapsed_ms}ms: {}", describe(.attempts))]
    DeadlineExceeded {
        elapsed_ms: u64,
        attempts: Vec<AttemptFailure>,
    },

    #[error("Request cancelled")]
    Cancelled { attempts: Vec<AttemptFailure> },
}

impl GenerationError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Failed provider candidates in the order they were tried
    pub fn attempts(&self) -> &[AttemptFailure] {
        match self {
            Self::Exhausted { attempts }
            | Self::DeadlineExceeded { attempts, .. }
            | Self::Cancelled { attempts } => attempts,
            _ => &[],
        }
    }
}

impl From<DomainError> for GenerationError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Validation { message } | DomainError::NotFound { message } => {
                Self::InvalidRequest(message)
            }
            other => Self::Retrieval(other),
        }
    }
}
