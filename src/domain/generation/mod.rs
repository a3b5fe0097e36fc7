//! Generation orchestration: request/result value objects, the terminal
//! error taxonomy, grounded prompt assembly, and the orchestrator itself.

mod error;
mod orchestrator;
pub mod prompt;
mod request;
mod result;

pub use error::{AttemptFailure, GenerationError};
pub use orchestrator::{GenerationOrchestrator, MAX_REQUEST_DEADLINE, OrchestratorSettings};
pub use request::GenerationRequest;
pub use result::GenerationResult;
