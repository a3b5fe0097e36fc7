//! API error types

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::domain::{AttemptFailure, DomainError, GenerationError};

/// Error categories reported in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorType {
    InvalidRequestError,
    NotFoundError,
    InsufficientContextError,
    UpstreamError,
    ServerError,
    ServiceUnavailableError,
    TimeoutError,
    CancelledError,
}

impl std::fmt::Display for ApiErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InvalidRequestError => "invalid_request_error",
            Self::NotFoundError => "not_found_error",
            Self::InsufficientContextError => "insufficient_context_error",
            Self::UpstreamError => "upstream_error",
            Self::ServerError => "server_error",
            Self::ServiceUnavailableError => "service_unavailable_error",
            Self::TimeoutError => "timeout_error",
            Self::CancelledError => "cancelled_error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: ApiErrorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Per-provider failures behind an exhausted, timed-out or cancelled generation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptFailure>,
}

/// API error with status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, error_type: ApiErrorType, message: impl Into<String>) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                error: ApiErrorDetail {
                    message: message.into(),
                    error_type,
                    param: None,
                    code: None,
                    attempts: Vec::new(),
                },
            },
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.response.error.param = Some(param.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.response.error.code = Some(code.into());
        self
    }

    pub fn with_attempts(mut self, attempts: Vec<AttemptFailure>) -> Self {
        self.response.error.attempts = attempts;
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ApiErrorType::InvalidRequestError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ApiErrorType::NotFoundError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ApiErrorType::ServerError, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorType::ServiceUnavailableError,
            message,
        )
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, ApiErrorType::UpstreamError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { message } => Self::not_found(message),
            DomainError::Validation { message } => Self::bad_request(message),
            DomainError::Provider(e) => Self::bad_gateway(e.to_string()).with_code(e.kind.as_str()),
            DomainError::Embedding { message } => Self::bad_gateway(message).with_code("embedding"),
            DomainError::KnowledgeBase(message) => Self::internal(message),
            DomainError::Configuration { message } => Self::internal(message),
            DomainError::Internal { message } => Self::internal(message),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        let message = err.to_string();

        match err {
            GenerationError::InvalidRequest(message) => Self::bad_request(message),
            GenerationError::Retrieval(DomainError::Validation { message }) => {
                Self::bad_request(message)
            }
            GenerationError::Retrieval(_) => Self::bad_gateway(message).with_code("retrieval_failed"),
            GenerationError::InsufficientContext => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiErrorType::InsufficientContextError,
                message,
            ),
            GenerationError::Exhausted { attempts } => Self::unavailable(message)
                .with_code("providers_exhausted")
                .with_attempts(attempts),
            GenerationError::DeadlineExceeded { attempts, .. } => {
                Self::new(StatusCode::GATEWAY_TIMEOUT, ApiErrorType::TimeoutError, message)
                    .with_attempts(attempts)
            }
            GenerationError::Cancelled { attempts } => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                ApiErrorType::CancelledError,
                message,
            )
            .with_attempts(attempts),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.response.error.error_type, self.response.error.message
        )
    }
}

impl std::error::Error for ApiError {}
