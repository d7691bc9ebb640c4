//! Ingestion pipeline request, outcome and error types

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::chunker::ChunkingOptions;
use super::source::ImportSource;
use crate::domain::knowledge_base::KnowledgeBaseId;
use crate::domain::KnowledgeError;

/// Step of an import, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStage {
    /// Turning the source into plain text
    Resolve,
    /// Writing the pending document row
    PersistDocument,
    Split,
    Embed,
    PersistChunks,
    PersistEmbeddings,
    /// Marking the document parsed
    Finalize,
}

impl IngestionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::PersistDocument => "persist_document",
            Self::Split => "split",
            Self::Embed => "embed",
            Self::PersistChunks => "persist_chunks",
            Self::PersistEmbeddings => "persist_embeddings",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for IngestionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An import that stopped at `stage`
#[derive(Debug, Error)]
#[error("Ingestion failed at {stage}: {source}")]
pub struct IngestionError {
    pub stage: IngestionStage,
    /// Document created before the failure, left `pending`
    pub document_id: Option<Uuid>,
    #[source]
    pub source: KnowledgeError,
}

impl IngestionError {
    pub fn new(stage: IngestionStage, source: KnowledgeError) -> Self {
        Self {
            stage,
            document_id: None,
            source,
        }
    }

    pub fn with_document(mut self, document_id: Uuid) -> Self {
        self.document_id = Some(document_id);
        self
    }

    /// The underlying error kind
    pub fn kind(&self) -> &KnowledgeError {
        &self.source
    }
}

/// Request to import one document into a knowledge base
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub knowledge_base_id: KnowledgeBaseId,
    pub source: ImportSource,
    /// Overrides the knowledge base's chunking configuration
    pub chunking: Option<ChunkingOptions>,
    /// Overrides the title found by the parser
    pub title: Option<String>,
}

impl ImportRequest {
    pub fn new(knowledge_base_id: KnowledgeBaseId, source: ImportSource) -> Self {
        Self {
            knowledge_base_id,
            source,
            chunking: None,
            title: None,
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkingOptions) -> Self {
        self.chunking = Some(chunking);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Result of a successful import
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub document_id: Uuid,
    pub chunk_count: usize,
    /// Chunks that received an embedding; lower than `chunk_count` in degraded mode
    pub embedded_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingestion_error_names_stage() {
        let error = IngestionError::new(
            IngestionStage::Split,
            KnowledgeError::EmptyContentAfterSplit,
        );

        assert_eq!(
            error.to_string(),
            "Ingestion failed at split: No content left after splitting"
        );
        assert!(matches!(error.kind(), KnowledgeError::EmptyContentAfterSplit));
    }

    #[test]
    fn test_ingestion_error_keeps_document_id() {
        let id = Uuid::new_v4();
        let error = IngestionError::new(
            IngestionStage::PersistChunks,
            KnowledgeError::store("create_chunks", "boom"),
        )
        .with_document(id);

        assert_eq!(error.document_id, Some(id));
    }
}
