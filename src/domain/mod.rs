//! Domain layer - entities, collaborator traits and errors

pub mod embedding;
pub mod error;
pub mod ingestion;
pub mod knowledge_base;

pub use embedding::Embedder;
pub use error::KnowledgeError;
pub use ingestion::{
    Chunker, ChunkingOptions, DocumentParser, ImportOutcome, ImportRequest, ImportSource,
    IngestionError, IngestionStage, UrlLoader,
};
pub use knowledge_base::{
    Chunk, ChunkWithScore, DistanceFunction, Document, Embedding, KnowledgeBase,
    KnowledgeBaseConfig, KnowledgeBaseId, KnowledgeStore, ParseStatus, SearchResponse,
    SearchScope, SourceType, Tag, TagUpdate,
};
