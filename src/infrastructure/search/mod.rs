//! Search engines over a knowledge store

mod full_text;
mod hybrid;
mod vector;

pub use full_text::FullTextSearchEngine;
pub use hybrid::{HybridSearchEngine, HybridSearchRequest, HYBRID_OVERSAMPLE};
pub use vector::VectorSearchEngine;
