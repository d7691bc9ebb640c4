//! Knowledge base domain: entities, search types and the store trait

pub mod chunk;
pub mod config;
pub mod document;
pub mod entity;
pub mod fusion;
pub mod predicate;
pub mod search;
pub mod store;
pub mod tag;
pub mod validation;

pub use chunk::{Chunk, Embedding};
pub use config::{EmbeddingSettings, KnowledgeBaseConfig, ParserSettings};
pub use document::{content_hash, Document, ParseStatus, SourceType};
pub use entity::{KnowledgeBase, KnowledgeBaseId, KnowledgeBaseStatus};
pub use fusion::{fuse_scores, HybridQuery};
pub use predicate::{check_predicate, validate_identifier, SafePredicate, FORBIDDEN_KEYWORDS};
pub use search::{
    ChunkDistance, ChunkWithScore, DistanceFunction, HybridWeights, SearchResponse, SearchScope,
    TextQuery, VectorQuery, VectorSearchOptions, DEFAULT_TEXT_WEIGHT, DEFAULT_VECTOR_WEIGHT,
};
pub use store::KnowledgeStore;
pub use tag::{ChunkTag, Tag, TagUpdate, DEFAULT_TAG_COLOR};
pub use validation::{
    validate_dimensions, validate_knowledge_base_id, validate_limit, validate_tag_color,
    validate_tag_name, validate_weight, KnowledgeBaseValidationError,
};
