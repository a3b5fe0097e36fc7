//! Infrastructure layer - External service implementations

pub mod embedding;
pub mod knowledge_base;
pub mod llm;
pub mod logging;
pub mod observability;
pub mod rerank;
pub mod usage;
