//! Retrieval-augmented generation: the online retrieval pipeline

mod pipeline;

pub use pipeline::{RetrievalOptions, RetrievalPipeline, RetrievalSettings};
