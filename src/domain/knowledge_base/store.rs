//! Knowledge store trait

use std::fmt::Debug;

use async_trait::async_trait;
use uuid::Uuid;

use super::chunk::{Chunk, Embedding};
use super::document::{Document, ParseStatus};
use super::entity::{KnowledgeBase, KnowledgeBaseId};
use super::fusion::{fuse_scores, HybridQuery};
use super::search::{ChunkDistance, ChunkWithScore, TextQuery, VectorQuery};
use super::tag::Tag;
use crate::domain::KnowledgeError;

/// Persistence for knowledge bases, documents, chunks, embeddings and tags
///
/// Implementations own all synchronization. Deletes cascade explicitly:
/// associations and embeddings go first, then the owning row.
#[async_trait]
pub trait KnowledgeStore: Send + Sync + Debug {
    /// Backend name used in logs
    fn store_type(&self) -> &'static str;

    // Knowledge bases

    /// Insert a knowledge base; an existing id is a conflict
    async fn create_knowledge_base(&self, kb: &KnowledgeBase) -> Result<(), KnowledgeError>;

    async fn get_knowledge_base(
        &self,
        id: &KnowledgeBaseId,
    ) -> Result<Option<KnowledgeBase>, KnowledgeError>;

    async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, KnowledgeError>;

    /// Overwrite name, description, status and config; false if missing
    async fn update_knowledge_base(&self, kb: &KnowledgeBase) -> Result<bool, KnowledgeError>;

    /// Delete a knowledge base and everything it owns
    async fn delete_knowledge_base(&self, id: &KnowledgeBaseId) -> Result<bool, KnowledgeError>;

    // Documents

    async fn create_document(&self, document: &Document) -> Result<(), KnowledgeError>;

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, KnowledgeError>;

    /// Documents of a knowledge base, newest first
    async fn list_documents(
        &self,
        kb_id: &KnowledgeBaseId,
    ) -> Result<Vec<Document>, KnowledgeError>;

    async fn update_document_status(
        &self,
        id: Uuid,
        status: ParseStatus,
    ) -> Result<bool, KnowledgeError>;

    /// Delete a document with its chunks, embeddings and chunk tags
    async fn delete_document(&self, id: Uuid) -> Result<bool, KnowledgeError>;

    // Chunks

    /// Insert a batch of chunks in one write
    async fn create_chunks(&self, chunks: &[Chunk]) -> Result<(), KnowledgeError>;

    async fn get_chunk(&self, id: Uuid) -> Result<Option<Chunk>, KnowledgeError>;

    /// Chunks of a document ordered by chunk index
    async fn list_chunks_by_document(&self, document_id: Uuid)
    -> Result<Vec<Chunk>, KnowledgeError>;

    async fn count_chunks(&self, kb_id: &KnowledgeBaseId) -> Result<usize, KnowledgeError>;

    async fn set_chunk_enabled(&self, id: Uuid, enabled: bool) -> Result<bool, KnowledgeError>;

    /// Delete a chunk after its embedding and tag associations
    async fn delete_chunk(&self, id: Uuid) -> Result<bool, KnowledgeError>;

    // Embeddings

    /// Insert a batch of embeddings, replacing any existing row for the same chunk
    async fn upsert_embeddings(&self, embeddings: &[Embedding]) -> Result<(), KnowledgeError>;

    async fn get_embedding_by_chunk(
        &self,
        chunk_id: Uuid,
    ) -> Result<Option<Embedding>, KnowledgeError>;

    // Tags

    /// Insert a tag; a duplicate name within the knowledge base is a conflict
    async fn create_tag(&self, tag: &Tag) -> Result<(), KnowledgeError>;

    async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>, KnowledgeError>;

    /// Tags of a knowledge base ordered by name
    async fn list_tags(&self, kb_id: &KnowledgeBaseId) -> Result<Vec<Tag>, KnowledgeError>;

    async fn update_tag(&self, tag: &Tag) -> Result<bool, KnowledgeError>;

    /// Delete a tag after its chunk associations
    async fn delete_tag(&self, id: Uuid) -> Result<bool, KnowledgeError>;

    /// Associate a chunk with a tag; an existing pair is a no-op
    async fn add_tag_to_chunk(&self, chunk_id: Uuid, tag_id: Uuid) -> Result<(), KnowledgeError>;

    async fn remove_tag_from_chunk(
        &self,
        chunk_id: Uuid,
        tag_id: Uuid,
    ) -> Result<bool, KnowledgeError>;

    async fn list_tags_for_chunk(&self, chunk_id: Uuid) -> Result<Vec<Tag>, KnowledgeError>;

    /// Chunks carrying a tag ordered by document and chunk index
    async fn list_chunks_for_tag(
        &self,
        tag_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Chunk>, KnowledgeError>;

    // Search primitives

    /// Enabled, embedded chunks ordered by raw distance ascending
    async fn search_by_vector(
        &self,
        query: &VectorQuery,
    ) -> Result<Vec<ChunkDistance>, KnowledgeError>;

    /// Enabled chunks matching the query, ranked by lexical relevance in [0, 1)
    async fn search_by_full_text(
        &self,
        query: &TextQuery,
    ) -> Result<Vec<ChunkWithScore>, KnowledgeError>;

    /// Run both primitives and fuse them with the query weights
    ///
    /// A failure in either leg fails the whole search.
    async fn search_hybrid(
        &self,
        query: &HybridQuery,
    ) -> Result<Vec<ChunkWithScore>, KnowledgeError> {
        let (vector_rows, text_hits) = futures::try_join!(
            self.search_by_vector(&query.vector),
            self.search_by_full_text(&query.text)
        )?;

        let distance_function = query.vector.distance_function;
        let vector_hits = vector_rows
            .into_iter()
            .map(|row| ChunkWithScore::new(row.chunk, distance_function.score(row.distance)))
            .collect();

        Ok(fuse_scores(vector_hits, text_hits, query.weights, query.limit))
    }

    /// Check that the backend is reachable
    async fn health_check(&self) -> Result<bool, KnowledgeError>;
}
