//! Knowledge service - the outward surface of the knowledge engine
//!
//! Thin pass-throughs to the store, the ingestion pipeline and the search
//! engines, keyed by string ids the way callers hold them.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::embedding::Embedder;
use crate::domain::ingestion::{ImportOutcome, ImportRequest, IngestionError};
use crate::domain::knowledge_base::{
    Chunk, ChunkWithScore, DistanceFunction, Document, HybridWeights, KnowledgeBase,
    KnowledgeBaseConfig, KnowledgeBaseId, KnowledgeBaseStatus, KnowledgeStore, SearchResponse,
    SearchScope, Tag, TagUpdate, VectorSearchOptions,
};
use crate::domain::KnowledgeError;
use crate::infrastructure::ingestion::IngestionPipeline;
use crate::infrastructure::search::{
    FullTextSearchEngine, HybridSearchEngine, HybridSearchRequest, VectorSearchEngine,
};

/// Request to create a new knowledge base
#[derive(Debug, Clone)]
pub struct CreateKnowledgeBaseRequest {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub config: Option<KnowledgeBaseConfig>,
}

/// Request to update an existing knowledge base
#[derive(Debug, Clone, Default)]
pub struct UpdateKnowledgeBaseRequest {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub config: Option<KnowledgeBaseConfig>,
    pub status: Option<KnowledgeBaseStatus>,
}

/// Request to create a tag
#[derive(Debug, Clone)]
pub struct CreateTagRequest {
    pub name: String,
    pub color: Option<String>,
    pub description: Option<String>,
}

/// Knowledge service
pub struct KnowledgeService {
    store: Arc<dyn KnowledgeStore>,
    pipeline: IngestionPipeline,
    vector: VectorSearchEngine,
    full_text: FullTextSearchEngine,
    hybrid: HybridSearchEngine,
    distance_function: DistanceFunction,
}

impl std::fmt::Debug for KnowledgeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeService")
            .field("store", &self.store.store_type())
            .field("distance_function", &self.distance_function)
            .finish()
    }
}

impl KnowledgeService {
    /// Create a service over `store`; the pipeline must write to the same store
    pub fn new(store: Arc<dyn KnowledgeStore>, pipeline: IngestionPipeline) -> Self {
        Self {
            vector: VectorSearchEngine::new(store.clone()),
            full_text: FullTextSearchEngine::new(store.clone()),
            hybrid: HybridSearchEngine::new(store.clone()),
            store,
            pipeline,
            distance_function: DistanceFunction::default(),
        }
    }

    /// Distance function used by `search`
    pub fn with_distance_function(mut self, distance_function: DistanceFunction) -> Self {
        self.distance_function = distance_function;
        self
    }

    pub fn embedder(&self) -> Option<&Arc<dyn Embedder>> {
        self.pipeline.embedder()
    }

    // Knowledge bases

    pub async fn create_knowledge_base(
        &self,
        request: CreateKnowledgeBaseRequest,
    ) -> Result<KnowledgeBase, KnowledgeError> {
        let kb_id = parse_kb_id(&request.id)?;

        if self.store.get_knowledge_base(&kb_id).await?.is_some() {
            return Err(KnowledgeError::conflict(format!(
                "Knowledge base with ID '{}' already exists",
                request.id
            )));
        }

        let mut kb = KnowledgeBase::new(kb_id, request.name);

        if let Some(description) = request.description {
            kb = kb.with_description(description);
        }

        if let Some(config) = request.config {
            config.validate()?;
            kb = kb.with_config(config);
        }

        self.store.create_knowledge_base(&kb).await?;
        tracing::info!(kb_id = %kb.id(), "Created knowledge base");

        Ok(kb)
    }

    pub async fn get_knowledge_base(&self, id: &str) -> Result<Option<KnowledgeBase>, KnowledgeError> {
        let kb_id = parse_kb_id(id)?;
        self.store.get_knowledge_base(&kb_id).await
    }

    /// Get a knowledge base, returning an error if not found
    pub async fn get_knowledge_base_required(&self, id: &str) -> Result<KnowledgeBase, KnowledgeError> {
        self.get_knowledge_base(id)
            .await?
            .ok_or_else(|| KnowledgeError::not_found(format!("Knowledge base '{}' not found", id)))
    }

    pub async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, KnowledgeError> {
        self.store.list_knowledge_bases().await
    }

    pub async fn update_knowledge_base(
        &self,
        id: &str,
        request: UpdateKnowledgeBaseRequest,
    ) -> Result<KnowledgeBase, KnowledgeError> {
        let mut kb = self.get_knowledge_base_required(id).await?;

        if let Some(name) = request.name {
            kb.set_name(name);
        }

        if let Some(description) = request.description {
            kb.set_description(description);
        }

        if let Some(config) = request.config {
            config.validate()?;
            kb.set_config(config);
        }

        if let Some(status) = request.status {
            kb.set_status(status);
        }

        if !self.store.update_knowledge_base(&kb).await? {
            return Err(KnowledgeError::not_found(format!("Knowledge base '{}' not found", id)));
        }

        Ok(kb)
    }

    /// Delete a knowledge base with all its documents, chunks and tags
    pub async fn delete_knowledge_base(&self, id: &str) -> Result<bool, KnowledgeError> {
        let kb_id = parse_kb_id(id)?;
        let deleted = self.store.delete_knowledge_base(&kb_id).await?;

        if deleted {
            tracing::info!(kb_id = %kb_id, "Deleted knowledge base");
        }

        Ok(deleted)
    }

    // Ingestion

    pub async fn import_document(&self, request: ImportRequest) -> Result<ImportOutcome, IngestionError> {
        self.pipeline.import(request).await
    }

    // Documents

    pub async fn list_documents(&self, kb_id: &str) -> Result<Vec<Document>, KnowledgeError> {
        let kb_id = parse_kb_id(kb_id)?;
        self.store.list_documents(&kb_id).await
    }

    pub async fn get_document(&self, id: Uuid) -> Result<Option<Document>, KnowledgeError> {
        self.store.get_document(id).await
    }

    pub async fn delete_document(&self, id: Uuid) -> Result<bool, KnowledgeError> {
        self.store.delete_document(id).await
    }

    // Chunks

    pub async fn get_chunk(&self, id: Uuid) -> Result<Option<Chunk>, KnowledgeError> {
        self.store.get_chunk(id).await
    }

    pub async fn list_chunks(&self, document_id: Uuid) -> Result<Vec<Chunk>, KnowledgeError> {
        self.store.list_chunks_by_document(document_id).await
    }

    pub async fn count_chunks(&self, kb_id: &str) -> Result<usize, KnowledgeError> {
        let kb_id = parse_kb_id(kb_id)?;
        self.store.count_chunks(&kb_id).await
    }

    /// Enable or disable a chunk; disabled chunks are skipped by every search
    pub async fn set_chunk_enabled(&self, id: Uuid, enabled: bool) -> Result<bool, KnowledgeError> {
        self.store.set_chunk_enabled(id, enabled).await
    }

    pub async fn delete_chunk(&self, id: Uuid) -> Result<bool, KnowledgeError> {
        self.store.delete_chunk(id).await
    }

    // Tags

    pub async fn create_tag(&self, kb_id: &str, request: CreateTagRequest) -> Result<Tag, KnowledgeError> {
        let kb = self.get_knowledge_base_required(kb_id).await?;

        let mut tag = Tag::new(kb.id().clone(), request.name)?;
        if let Some(color) = request.color {
            tag = tag.with_color(color)?;
        }
        if let Some(description) = request.description {
            tag = tag.with_description(description);
        }

        self.store.create_tag(&tag).await?;
        Ok(tag)
    }

    pub async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>, KnowledgeError> {
        self.store.get_tag(id).await
    }

    pub async fn list_tags(&self, kb_id: &str) -> Result<Vec<Tag>, KnowledgeError> {
        let kb_id = parse_kb_id(kb_id)?;
        self.store.list_tags(&kb_id).await
    }

    pub async fn update_tag(&self, id: Uuid, update: TagUpdate) -> Result<Tag, KnowledgeError> {
        let mut tag = self
            .store
            .get_tag(id)
            .await?
            .ok_or_else(|| KnowledgeError::not_found(format!("Tag {} not found", id)))?;

        tag.apply(update)?;

        if !self.store.update_tag(&tag).await? {
            return Err(KnowledgeError::not_found(format!("Tag {} not found", id)));
        }

        Ok(tag)
    }

    pub async fn delete_tag(&self, id: Uuid) -> Result<bool, KnowledgeError> {
        self.store.delete_tag(id).await
    }

    pub async fn add_tag_to_chunk(&self, chunk_id: Uuid, tag_id: Uuid) -> Result<(), KnowledgeError> {
        self.store.add_tag_to_chunk(chunk_id, tag_id).await
    }

    pub async fn remove_tag_from_chunk(&self, chunk_id: Uuid, tag_id: Uuid) -> Result<bool, KnowledgeError> {
        self.store.remove_tag_from_chunk(chunk_id, tag_id).await
    }

    pub async fn list_tags_for_chunk(&self, chunk_id: Uuid) -> Result<Vec<Tag>, KnowledgeError> {
        self.store.list_tags_for_chunk(chunk_id).await
    }

    pub async fn list_chunks_for_tag(
        &self,
        tag_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Chunk>, KnowledgeError> {
        self.store.list_chunks_for_tag(tag_id, limit, offset).await
    }

    // Search

    /// Hybrid search of one knowledge base
    ///
    /// Without an embedder this is a degraded no-op returning an empty
    /// response rather than an error.
    pub async fn search(
        &self,
        kb_id: &str,
        query: &str,
        top_k: usize,
        vector_weight: f32,
        text_weight: f32,
    ) -> Result<SearchResponse, KnowledgeError> {
        let scope = SearchScope::knowledge_base(parse_kb_id(kb_id)?);
        self.search_scope(scope, query, top_k, HybridWeights::new(vector_weight, text_weight))
            .await
    }

    /// Hybrid search restricted to chunks carrying any of `tag_ids`
    pub async fn search_tagged(
        &self,
        kb_id: &str,
        tag_ids: Vec<Uuid>,
        query: &str,
        top_k: usize,
        weights: HybridWeights,
    ) -> Result<SearchResponse, KnowledgeError> {
        let scope = SearchScope::knowledge_base(parse_kb_id(kb_id)?).with_tags(tag_ids);
        self.search_scope(scope, query, top_k, weights).await
    }

    async fn search_scope(
        &self,
        scope: SearchScope,
        query: &str,
        top_k: usize,
        weights: HybridWeights,
    ) -> Result<SearchResponse, KnowledgeError> {
        let Some(embedder) = self.embedder() else {
            tracing::warn!("No embedder configured, returning empty search result");
            return Ok(SearchResponse::empty());
        };

        if query.trim().is_empty() {
            return Ok(SearchResponse::empty());
        }

        let vectors = embedder.embed_batch(&[query.to_string()]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| KnowledgeError::search("embedder returned no vector for the query"))?;

        let request = HybridSearchRequest::new(scope, query, vector, top_k)
            .with_weights(weights)
            .with_vector_options(
                VectorSearchOptions::default().with_distance_function(self.distance_function),
            );

        let chunks = self.hybrid.search(request).await?;
        Ok(SearchResponse::from_chunks(chunks))
    }

    /// Vector-only search with caller-supplied options
    pub async fn search_by_vector(
        &self,
        scope: SearchScope,
        vector: Vec<f32>,
        limit: usize,
        options: &VectorSearchOptions,
    ) -> Result<Vec<ChunkWithScore>, KnowledgeError> {
        self.vector.search(scope, vector, limit, options).await
    }

    /// Lexical-only search; works without an embedder
    pub async fn search_full_text(
        &self,
        scope: SearchScope,
        query: &str,
        limit: usize,
    ) -> Result<SearchResponse, KnowledgeError> {
        let chunks = self.full_text.search(scope, query, limit).await?;
        Ok(SearchResponse::from_chunks(chunks))
    }

    /// Check that the store is reachable
    pub async fn health_check(&self) -> Result<bool, KnowledgeError> {
        self.store.health_check().await
    }
}

/// Parse and validate a knowledge base ID string
fn parse_kb_id(id: &str) -> Result<KnowledgeBaseId, KnowledgeError> {
    Ok(KnowledgeBaseId::new(id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::MockEmbedder;
    use crate::domain::ingestion::{ChunkingOptions, ImportSource, RecursiveChunkingConfig};
    use crate::infrastructure::knowledge_base::InMemoryKnowledgeStore;
    use tokio_test::{assert_err, assert_ok};

    fn create_service(embedder: Option<MockEmbedder>) -> KnowledgeService {
        let store: Arc<dyn KnowledgeStore> = Arc::new(InMemoryKnowledgeStore::new());
        let mut pipeline = IngestionPipeline::new(store.clone());
        if let Some(embedder) = embedder {
            pipeline = pipeline.with_embedder(Arc::new(embedder));
        }
        KnowledgeService::new(store, pipeline)
    }

    fn create_request(id: &str) -> CreateKnowledgeBaseRequest {
        CreateKnowledgeBaseRequest {
            id: id.to_string(),
            name: format!("Test KB {}", id),
            description: Some("A test knowledge base".to_string()),
            config: None,
        }
    }

    async fn import_text(service: &KnowledgeService, kb: &str, text: &str) -> ImportOutcome {
        let request = ImportRequest::new(KnowledgeBaseId::new(kb).unwrap(), ImportSource::text(text))
            .with_chunking(ChunkingOptions::Recursive(RecursiveChunkingConfig::new(20, 0)));
        service.import_document(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_knowledge_base() {
        let service = create_service(None);

        let kb = service.create_knowledge_base(create_request("docs")).await.unwrap();
        assert_eq!(kb.name(), "Test KB docs");

        let fetched = service.get_knowledge_base("docs").await.unwrap();
        assert!(fetched.is_some());
        assert!(service.get_knowledge_base("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_knowledge_base() {
        let service = create_service(None);
        service.create_knowledge_base(create_request("docs")).await.unwrap();

        let result = service.create_knowledge_base(create_request("docs")).await;

        assert!(matches!(result, Err(KnowledgeError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_invalid_knowledge_base_id() {
        let service = create_service(None);

        let error = assert_err!(service.create_knowledge_base(create_request("has spaces")).await);

        assert!(matches!(error, KnowledgeError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_update_knowledge_base() {
        let service = create_service(None);
        service.create_knowledge_base(create_request("docs")).await.unwrap();

        let updated = service
            .update_knowledge_base(
                "docs",
                UpdateKnowledgeBaseRequest {
                    name: Some("Renamed".to_string()),
                    description: Some(None),
                    status: Some(KnowledgeBaseStatus::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name(), "Renamed");
        assert!(updated.description().is_none());
        assert!(!updated.is_active());

        let missing = service
            .update_knowledge_base("nope", UpdateKnowledgeBaseRequest::default())
            .await;
        assert!(matches!(missing, Err(KnowledgeError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_search_without_embedder_is_empty() {
        let service = create_service(None);
        service.create_knowledge_base(create_request("docs")).await.unwrap();
        import_text(&service, "docs", "hello world, hello again").await;

        let response = service.search("docs", "hello", 10, 0.7, 0.3).await.unwrap();

        assert!(response.chunks.is_empty());
        assert_eq!(response.total_count, 0);
    }

    #[tokio::test]
    async fn test_search_with_embedder_finds_imported_chunks() {
        let service = create_service(Some(MockEmbedder::new(16)));
        service.create_knowledge_base(create_request("docs")).await.unwrap();
        import_text(&service, "docs", "Alpha Alpha Alpha. Beta Beta Beta.").await;

        let response = service.search("docs", "Beta", 1, 0.7, 0.3).await.unwrap();

        assert_eq!(response.total_count, 1);
        assert_eq!(response.chunks[0].chunk.content(), "Beta Beta Beta.");
    }

    #[tokio::test]
    async fn test_blank_query_is_empty() {
        let service = create_service(Some(MockEmbedder::new(8)));
        service.create_knowledge_base(create_request("docs")).await.unwrap();

        let response = service.search("docs", "  ", 10, 0.7, 0.3).await.unwrap();

        assert_eq!(response.total_count, 0);
    }

    #[tokio::test]
    async fn test_embedder_failure_propagates() {
        let service = create_service(Some(MockEmbedder::new(8).with_error("quota exceeded")));
        service.create_knowledge_base(create_request("docs")).await.unwrap();

        let result = service.search("docs", "anything", 10, 0.7, 0.3).await;

        assert!(matches!(result, Err(KnowledgeError::Embedding { .. })));
    }

    #[tokio::test]
    async fn test_tag_lifecycle() {
        let service = create_service(None);
        service.create_knowledge_base(create_request("docs")).await.unwrap();
        let outcome = import_text(&service, "docs", "Alpha Alpha Alpha. Beta Beta Beta.").await;
        let chunks = service.list_chunks(outcome.document_id).await.unwrap();

        let tag = service
            .create_tag(
                "docs",
                CreateTagRequest {
                    name: "faq".to_string(),
                    color: Some("#ff0000".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap();

        assert_ok!(service.add_tag_to_chunk(chunks[0].id(), tag.id()).await);
        assert_ok!(service.add_tag_to_chunk(chunks[0].id(), tag.id()).await);
        assert_eq!(service.list_chunks_for_tag(tag.id(), 10, 0).await.unwrap().len(), 1);

        let renamed = service
            .update_tag(
                tag.id(),
                TagUpdate {
                    name: Some("help".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name(), "help");

        assert!(service.delete_tag(tag.id()).await.unwrap());
        assert!(service.list_tags_for_chunk(chunks[0].id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tag_on_missing_knowledge_base() {
        let service = create_service(None);

        let result = service
            .create_tag(
                "ghost",
                CreateTagRequest {
                    name: "faq".to_string(),
                    color: None,
                    description: None,
                },
            )
            .await;

        assert!(matches!(result, Err(KnowledgeError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_tagged_search_only_returns_tagged_chunks() {
        let service = create_service(Some(MockEmbedder::new(16)));
        service.create_knowledge_base(create_request("docs")).await.unwrap();
        let outcome = import_text(&service, "docs", "Alpha Alpha Alpha. Beta Beta Beta.").await;
        let chunks = service.list_chunks(outcome.document_id).await.unwrap();

        let tag = service
            .create_tag(
                "docs",
                CreateTagRequest {
                    name: "alpha".to_string(),
                    color: None,
                    description: None,
                },
            )
            .await
            .unwrap();
        service.add_tag_to_chunk(chunks[0].id(), tag.id()).await.unwrap();

        let response = service
            .search_tagged("docs", vec![tag.id()], "Beta", 10, HybridWeights::default())
            .await
            .unwrap();

        assert!(response.chunks.iter().all(|hit| hit.chunk.id() == chunks[0].id()));
    }

    #[tokio::test]
    async fn test_disabled_chunks_are_not_searchable() {
        let service = create_service(None);
        service.create_knowledge_base(create_request("docs")).await.unwrap();
        let outcome = import_text(&service, "docs", "Alpha Alpha Alpha. Beta Beta Beta.").await;
        let chunks = service.list_chunks(outcome.document_id).await.unwrap();
        let scope = SearchScope::knowledge_base(KnowledgeBaseId::new("docs").unwrap());

        service.set_chunk_enabled(chunks[1].id(), false).await.unwrap();
        let response = service.search_full_text(scope, "Beta", 10).await.unwrap();

        assert_eq!(response.total_count, 0);
        assert_eq!(service.count_chunks("docs").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_document_removes_chunks() {
        let service = create_service(None);
        service.create_knowledge_base(create_request("docs")).await.unwrap();
        let outcome = import_text(&service, "docs", "Alpha Alpha Alpha. Beta Beta Beta.").await;

        assert!(service.delete_document(outcome.document_id).await.unwrap());
        assert_eq!(service.count_chunks("docs").await.unwrap(), 0);
        assert!(service.list_documents("docs").await.unwrap().is_empty());
    }
}
