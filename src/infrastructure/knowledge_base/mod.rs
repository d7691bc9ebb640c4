//! Knowledge store implementations

mod in_memory;
mod pgvector;
mod query;

pub use in_memory::InMemoryKnowledgeStore;
pub use pgvector::{parse_pgvector, PgKnowledgeStore};
pub use query::{
    build_full_text_query, build_vector_search_query, embedding_to_pgvector, CHUNK_COLUMNS,
};
