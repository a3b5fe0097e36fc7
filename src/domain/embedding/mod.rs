//! Embedding domain: the embedder trait and vector math

mod provider;
mod vector;

pub use provider::Embedder;
pub use vector::{cosine_similarity, normalize};

#[cfg(test)]
pub use provider::mock::MockEmbedder;
