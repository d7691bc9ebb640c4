//! Embedding domain - the embedder contract and vector math

pub mod embedder;
pub mod vector;

pub use embedder::Embedder;
pub use vector::{cosine_distance, cosine_similarity, inner_product, l2_distance};

#[cfg(test)]
pub use embedder::mock::MockEmbedder;
