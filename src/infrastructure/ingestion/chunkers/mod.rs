//! Chunking strategy implementations

mod recursive;
mod semantic;

pub use recursive::RecursiveChunker;
pub use semantic::SemanticChunker;
