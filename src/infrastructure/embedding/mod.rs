//! Embedding provider implementations

mod cached;
mod hashing;
mod openai;

pub use cached::CachedEmbedder;
pub use hashing::{HashingEmbedder, terms};
pub use openai::OpenAiEmbedder;
