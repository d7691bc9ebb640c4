//! Knowledge engine
//!
//! Ingestion and retrieval for knowledge bases:
//! - Text, file and URL import with recursive or semantic chunking
//! - Batched embedding and pgvector persistence
//! - Vector, full-text and weighted hybrid search
//! - Chunk tagging with tag-scoped search

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{KnowledgeError, KnowledgeStore};
pub use infrastructure::ingestion::IngestionPipeline;
pub use infrastructure::services::KnowledgeService;
