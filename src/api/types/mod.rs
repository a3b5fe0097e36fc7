//! Request, response and error types of the HTTP API

pub mod chat;
pub mod error;
pub mod json;

pub use chat::{ChatRequest, ChatResponse, MAX_QUESTION_CHARS, RagQuery, RagResult};
pub use error::{ApiError, ApiErrorResponse, ApiErrorType};
pub use json::Json;
