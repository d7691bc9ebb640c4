//! Chunk and embedding entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::content_hash;
use super::entity::KnowledgeBaseId;

/// A contiguous slice of a document's text, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    id: Uuid,
    knowledge_base_id: KnowledgeBaseId,
    document_id: Uuid,
    chunk_index: usize,
    content: String,
    content_hash: String,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Chunk {
    /// Create an enabled chunk, hashing its content
    pub fn new(
        knowledge_base_id: KnowledgeBaseId,
        document_id: Uuid,
        chunk_index: usize,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            knowledge_base_id,
            document_id,
            chunk_index,
            content_hash: content_hash(content.as_bytes()),
            content,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create with specific ID (for loading from DB)
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    // Getters
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn knowledge_base_id(&self) -> &KnowledgeBaseId {
        &self.knowledge_base_id
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.updated_at = Utc::now();
    }
}

/// Vector representation of one chunk (1:1, keyed by chunk id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    id: Uuid,
    knowledge_base_id: KnowledgeBaseId,
    chunk_id: Uuid,
    vector: Vec<f32>,
    model: String,
    created_at: DateTime<Utc>,
}

impl Embedding {
    pub fn new(
        knowledge_base_id: KnowledgeBaseId,
        chunk_id: Uuid,
        vector: Vec<f32>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            knowledge_base_id,
            chunk_id,
            vector,
            model: model.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn knowledge_base_id(&self) -> &KnowledgeBaseId {
        &self.knowledge_base_id
    }

    pub fn chunk_id(&self) -> Uuid {
        self.chunk_id
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kb() -> KnowledgeBaseId {
        KnowledgeBaseId::new("kb").unwrap()
    }

    #[test]
    fn test_chunk_hashes_content() {
        let doc_id = Uuid::new_v4();
        let a = Chunk::new(kb(), doc_id, 0, "same text");
        let b = Chunk::new(kb(), doc_id, 1, "same text");

        assert_ne!(a.id(), b.id());
        assert_eq!(a.content_hash(), b.content_hash());
        assert!(a.is_enabled());
    }

    #[test]
    fn test_disable_chunk() {
        let mut chunk = Chunk::new(kb(), Uuid::new_v4(), 0, "text");
        chunk.set_enabled(false);
        assert!(!chunk.is_enabled());
    }

    #[test]
    fn test_embedding_dimension() {
        let embedding = Embedding::new(kb(), Uuid::new_v4(), vec![0.1, 0.2, 0.3], "mock");
        assert_eq!(embedding.dimension(), 3);
        assert_eq!(embedding.model(), "mock");
    }
}
