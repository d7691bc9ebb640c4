//! Ingestion pipeline: source to searchable chunks

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::domain::embedding::Embedder;
use crate::domain::ingestion::{
    ChunkingOptions, ImportOutcome, ImportRequest, ImportSource, IngestionError, IngestionStage,
    ParserInput, TextChunk, UrlLoader,
};
use crate::domain::knowledge_base::{
    content_hash, Chunk, Document, Embedding, KnowledgeBase, KnowledgeStore, ParseStatus,
};
use crate::domain::KnowledgeError;
use crate::infrastructure::metrics::{record_ingestion, IngestionMetricParams};

use super::registry::{ChunkerFactory, ParserRegistry};

/// Text and title resolved from an import source
struct ResolvedSource {
    text: String,
    title: Option<String>,
    /// Fingerprint of the raw payload, before parsing
    hash: String,
}

/// Turns an import source into a document, chunks and embeddings
///
/// Stages run in order: resolve, persist the pending document, split,
/// embed (one batch call), persist chunks, persist embeddings, mark the
/// document parsed. A failure stops the run and leaves the document
/// `pending`. Without an embedder, recursive imports store chunks only.
pub struct IngestionPipeline {
    store: Arc<dyn KnowledgeStore>,
    parsers: ParserRegistry,
    embedder: Option<Arc<dyn Embedder>>,
    url_loader: Option<Arc<dyn UrlLoader>>,
    default_chunking: ChunkingOptions,
    stage_timeout: Option<Duration>,
}

impl IngestionPipeline {
    /// Pipeline with the built-in parsers and recursive chunking
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            store,
            parsers: ParserRegistry::with_defaults(),
            embedder: None,
            url_loader: None,
            default_chunking: ChunkingOptions::default(),
            stage_timeout: None,
        }
    }

    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_url_loader(mut self, loader: Arc<dyn UrlLoader>) -> Self {
        self.url_loader = Some(loader);
        self
    }

    /// Chunking used when neither the request nor the knowledge base sets one
    pub fn with_default_chunking(mut self, options: ChunkingOptions) -> Self {
        self.default_chunking = options;
        self
    }

    /// Abort any single stage that runs longer than `timeout`
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    pub fn embedder(&self) -> Option<&Arc<dyn Embedder>> {
        self.embedder.as_ref()
    }

    /// Import one document
    pub async fn import(&self, request: ImportRequest) -> Result<ImportOutcome, IngestionError> {
        let started = Instant::now();
        let kb_id = request.knowledge_base_id.to_string();
        let strategy = self.chunking_for(&request, None).name();

        let result = self.run(request).await;

        let (failed_stage, chunk_count, embedded_count) = match &result {
            Ok(outcome) => (None, outcome.chunk_count, outcome.embedded_count),
            Err(e) => (Some(e.stage.as_str()), 0, 0),
        };

        record_ingestion(IngestionMetricParams {
            knowledge_base_id: &kb_id,
            strategy,
            duration: started.elapsed(),
            failed_stage,
            chunk_count,
            embedded_count,
        });

        match &result {
            Ok(outcome) => tracing::info!(
                kb_id = %kb_id,
                document_id = %outcome.document_id,
                chunks = outcome.chunk_count,
                embedded = outcome.embedded_count,
                "Document imported"
            ),
            Err(e) => tracing::warn!(
                kb_id = %kb_id,
                stage = %e.stage,
                document_id = ?e.document_id,
                error = %e.source,
                "Document import failed"
            ),
        }

        result
    }

    async fn run(&self, request: ImportRequest) -> Result<ImportOutcome, IngestionError> {
        let kb = self
            .stage(IngestionStage::Resolve, None, async {
                self.store
                    .get_knowledge_base(&request.knowledge_base_id)
                    .await?
                    .ok_or_else(|| {
                        KnowledgeError::not_found(format!(
                            "Knowledge base '{}' not found",
                            request.knowledge_base_id
                        ))
                    })
            })
            .await?;

        let chunking = self.chunking_for(&request, Some(&kb)).clone();
        let chunker = ChunkerFactory::create(&chunking, self.embedder.clone())
            .map_err(|e| IngestionError::new(IngestionStage::Resolve, e))?;

        let resolved = self
            .stage(IngestionStage::Resolve, None, self.resolve(&request.source, &kb))
            .await?;

        let mut document = Document::new(
            kb.id().clone(),
            request.source.source_type(),
            resolved.hash.clone(),
        );
        if let Some(locator) = request.source.locator() {
            document = document.with_source_locator(locator);
        }
        if let Some(title) = request.title.clone().or(resolved.title) {
            document = document.with_title(title);
        }

        let document_id = document.id();
        self.stage(
            IngestionStage::PersistDocument,
            None,
            self.store.create_document(&document),
        )
        .await?;

        tracing::debug!(
            kb_id = %kb.id(),
            document_id = %document_id,
            strategy = chunker.name(),
            chars = resolved.text.chars().count(),
            "Splitting document"
        );

        let pieces = self
            .stage(IngestionStage::Split, Some(document_id), async {
                let pieces = chunker.split(&resolved.text).await?;
                if pieces.is_empty() {
                    return Err(KnowledgeError::EmptyContentAfterSplit);
                }
                Ok(pieces)
            })
            .await?;

        let vectors = self
            .stage(
                IngestionStage::Embed,
                Some(document_id),
                self.embed(&kb, &pieces),
            )
            .await?;

        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .map(|piece| Chunk::new(kb.id().clone(), document_id, piece.index, piece.content))
            .collect();

        self.stage(
            IngestionStage::PersistChunks,
            Some(document_id),
            self.store.create_chunks(&chunks),
        )
        .await?;

        let model = self.model_for(&kb);
        let embeddings: Vec<Embedding> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| Embedding::new(kb.id().clone(), chunk.id(), vector, &model))
            .collect();

        if !embeddings.is_empty() {
            self.stage(
                IngestionStage::PersistEmbeddings,
                Some(document_id),
                self.store.upsert_embeddings(&embeddings),
            )
            .await?;
        }

        self.stage(IngestionStage::Finalize, Some(document_id), async {
            self.store
                .update_document_status(document_id, ParseStatus::Parsed)
                .await
                .map(|_| ())
        })
        .await?;

        Ok(ImportOutcome {
            document_id,
            chunk_count: chunks.len(),
            embedded_count: embeddings.len(),
        })
    }

    /// Request override, then knowledge base config, then pipeline default
    fn chunking_for<'a>(
        &'a self,
        request: &'a ImportRequest,
        kb: Option<&'a KnowledgeBase>,
    ) -> &'a ChunkingOptions {
        request
            .chunking
            .as_ref()
            .or_else(|| kb.and_then(|kb| kb.config().chunking.as_ref()))
            .unwrap_or(&self.default_chunking)
    }

    fn model_for(&self, kb: &KnowledgeBase) -> String {
        kb.config()
            .embedding_model()
            .map(str::to_string)
            .or_else(|| self.embedder.as_ref().map(|e| e.model().to_string()))
            .unwrap_or_default()
    }

    async fn resolve(
        &self,
        source: &ImportSource,
        kb: &KnowledgeBase,
    ) -> Result<ResolvedSource, KnowledgeError> {
        match source {
            ImportSource::Text { content } => Ok(ResolvedSource {
                text: content.clone(),
                title: None,
                hash: content_hash(content.as_bytes()),
            }),
            ImportSource::Url { uri } => {
                let loader = self.url_loader.as_ref().ok_or_else(|| {
                    KnowledgeError::unsupported_source("no URL loader configured")
                })?;

                let text = loader.load(uri).await?;
                Ok(ResolvedSource {
                    hash: content_hash(text.as_bytes()),
                    text,
                    title: None,
                })
            }
            ImportSource::File { filename, bytes } => {
                let parser = self.parsers.for_filename(filename)?;
                let mime = mime_guess::from_path(filename).first_or_octet_stream();

                tracing::debug!(
                    kb_id = %kb.id(),
                    filename = %filename,
                    mime = %mime,
                    bytes = bytes.len(),
                    "Parsing uploaded file"
                );

                let input = ParserInput::new(filename.clone(), bytes.clone())
                    .with_settings(kb.config().parser.clone().unwrap_or_default());
                let parsed = parser.parse(&input).await?;

                Ok(ResolvedSource {
                    text: parsed.content,
                    title: parsed.title,
                    hash: content_hash(bytes),
                })
            }
        }
    }

    /// One batch call; vectors are checked against the knowledge base dimension
    async fn embed(
        &self,
        kb: &KnowledgeBase,
        pieces: &[TextChunk],
    ) -> Result<Vec<Vec<f32>>, KnowledgeError> {
        let Some(embedder) = &self.embedder else {
            tracing::warn!(
                kb_id = %kb.id(),
                chunks = pieces.len(),
                "No embedder configured; storing chunks without embeddings"
            );
            return Ok(Vec::new());
        };

        let texts: Vec<String> = pieces.iter().map(|p| p.content.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;

        if vectors.len() < texts.len() {
            tracing::warn!(
                kb_id = %kb.id(),
                chunks = texts.len(),
                vectors = vectors.len(),
                "Embedder returned fewer vectors than chunks; trailing chunks stay unembedded"
            );
        }

        let expected = kb
            .config()
            .embedding_dimensions()
            .unwrap_or_else(|| embedder.dimensions());

        if let Some(actual) = vectors.iter().map(Vec::len).find(|len| *len != expected) {
            return Err(KnowledgeError::DimensionMismatch { expected, actual });
        }

        Ok(vectors)
    }

    async fn stage<T, F>(
        &self,
        stage: IngestionStage,
        document_id: Option<Uuid>,
        future: F,
    ) -> Result<T, IngestionError>
    where
        F: Future<Output = Result<T, KnowledgeError>>,
    {
        let result = match self.stage_timeout {
            Some(limit) => tokio::time::timeout(limit, future)
                .await
                .unwrap_or_else(|_| Err(KnowledgeError::timeout(stage.as_str()))),
            None => future.await,
        };

        result.map_err(|source| {
            let error = IngestionError::new(stage, source);
            match document_id {
                Some(id) => error.with_document(id),
                None => error,
            }
        })
    }
}

impl fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("store", &self.store.store_type())
            .field("parsers", &self.parsers)
            .field("embedder", &self.embedder.as_ref().map(|e| e.model().to_string()))
            .field("url_loader", &self.url_loader.is_some())
            .field("default_chunking", &self.default_chunking.name())
            .field("stage_timeout", &self.stage_timeout)
            .finish()
    }
}
