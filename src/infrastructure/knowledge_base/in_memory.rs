//! In-memory knowledge store for development and testing

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::domain::embedding::{cosine_distance, inner_product, l2_distance};
use crate::domain::knowledge_base::{
    Chunk, ChunkDistance, ChunkWithScore, DistanceFunction, Document, Embedding, KnowledgeBase,
    KnowledgeBaseId, KnowledgeStore, ParseStatus, SearchScope, Tag, TextQuery, VectorQuery,
};
use crate::domain::KnowledgeError;

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

/// In-memory knowledge store for development without PostgreSQL
///
/// Implements the same contract as the pgvector store. Distances are exact;
/// lexical relevance is BM25 over the enabled chunks in scope, normalised
/// to `[0, 1)`. Extra SQL predicates are not supported.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKnowledgeStore {
    state: Arc<RwLock<State>>,
}

#[derive(Debug, Default)]
struct State {
    knowledge_bases: HashMap<KnowledgeBaseId, KnowledgeBase>,
    documents: HashMap<Uuid, Document>,
    chunks: HashMap<Uuid, StoredChunk>,
    /// Keyed by chunk id: one embedding per chunk
    embeddings: HashMap<Uuid, Embedding>,
    tags: HashMap<Uuid, Tag>,
    /// (chunk id, tag id)
    chunk_tags: BTreeSet<(Uuid, Uuid)>,
    next_seq: u64,
}

#[derive(Debug, Clone)]
struct StoredChunk {
    chunk: Chunk,
    /// Insertion order, used to break ranking ties
    seq: u64,
}

impl State {
    fn remove_chunk(&mut self, chunk_id: Uuid) -> bool {
        self.chunk_tags.retain(|(chunk, _)| *chunk != chunk_id);
        self.embeddings.remove(&chunk_id);
        self.chunks.remove(&chunk_id).is_some()
    }

    fn remove_tag(&mut self, tag_id: Uuid) -> bool {
        self.chunk_tags.retain(|(_, tag)| *tag != tag_id);
        self.tags.remove(&tag_id).is_some()
    }

    fn remove_document(&mut self, document_id: Uuid) -> bool {
        let chunk_ids: Vec<Uuid> = self
            .chunks
            .values()
            .filter(|c| c.chunk.document_id() == document_id)
            .map(|c| c.chunk.id())
            .collect();

        for chunk_id in chunk_ids {
            self.remove_chunk(chunk_id);
        }

        self.documents.remove(&document_id).is_some()
    }

    fn in_scope(&self, stored: &StoredChunk, scope: &SearchScope) -> bool {
        let chunk = &stored.chunk;

        if !chunk.is_enabled() {
            return false;
        }

        if !scope.knowledge_base_ids.is_empty()
            && !scope.knowledge_base_ids.contains(chunk.knowledge_base_id())
        {
            return false;
        }

        scope.tag_ids.is_empty()
            || scope
                .tag_ids
                .iter()
                .any(|tag_id| self.chunk_tags.contains(&(chunk.id(), *tag_id)))
    }

    fn sorted_tags<'a>(&self, tags: impl Iterator<Item = &'a Tag>) -> Vec<Tag> {
        let mut tags: Vec<Tag> = tags.cloned().collect();
        tags.sort_by(|a, b| a.name().cmp(b.name()));
        tags
    }
}

impl InMemoryKnowledgeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

fn raw_distance(function: DistanceFunction, a: &[f32], b: &[f32]) -> f64 {
    match function {
        DistanceFunction::Cosine => cosine_distance(a, b) as f64,
        DistanceFunction::L2 => l2_distance(a, b) as f64,
        // pgvector's <#> is the negated inner product
        DistanceFunction::InnerProduct => -(inner_product(a, b) as f64),
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    fn store_type(&self) -> &'static str {
        "in_memory"
    }

    async fn create_knowledge_base(&self, kb: &KnowledgeBase) -> Result<(), KnowledgeError> {
        let mut state = self.state.write().await;

        if state.knowledge_bases.contains_key(kb.id()) {
            return Err(KnowledgeError::conflict(format!(
                "Knowledge base '{}' already exists",
                kb.id()
            )));
        }

        state.knowledge_bases.insert(kb.id().clone(), kb.clone());
        Ok(())
    }

    async fn get_knowledge_base(
        &self,
        id: &KnowledgeBaseId,
    ) -> Result<Option<KnowledgeBase>, KnowledgeError> {
        Ok(self.state.read().await.knowledge_bases.get(id).cloned())
    }

    async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, KnowledgeError> {
        let state = self.state.read().await;
        let mut kbs: Vec<KnowledgeBase> = state.knowledge_bases.values().cloned().collect();
        kbs.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(kbs)
    }

    async fn update_knowledge_base(&self, kb: &KnowledgeBase) -> Result<bool, KnowledgeError> {
        let mut state = self.state.write().await;

        match state.knowledge_bases.get_mut(kb.id()) {
            Some(existing) => {
                *existing = kb.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_knowledge_base(&self, id: &KnowledgeBaseId) -> Result<bool, KnowledgeError> {
        let mut state = self.state.write().await;

        let document_ids: Vec<Uuid> = state
            .documents
            .values()
            .filter(|d| d.knowledge_base_id() == id)
            .map(Document::id)
            .collect();
        for document_id in document_ids {
            state.remove_document(document_id);
        }

        let tag_ids: Vec<Uuid> = state
            .tags
            .values()
            .filter(|t| t.knowledge_base_id() == id)
            .map(Tag::id)
            .collect();
        for tag_id in tag_ids {
            state.remove_tag(tag_id);
        }

        Ok(state.knowledge_bases.remove(id).is_some())
    }

    async fn create_document(&self, document: &Document) -> Result<(), KnowledgeError> {
        let mut state = self.state.write().await;

        if !state
            .knowledge_bases
            .contains_key(document.knowledge_base_id())
        {
            return Err(KnowledgeError::not_found(format!(
                "Knowledge base '{}' not found",
                document.knowledge_base_id()
            )));
        }

        state.documents.insert(document.id(), document.clone());
        Ok(())
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, KnowledgeError> {
        Ok(self.state.read().await.documents.get(&id).cloned())
    }

    async fn list_documents(
        &self,
        kb_id: &KnowledgeBaseId,
    ) -> Result<Vec<Document>, KnowledgeError> {
        let state = self.state.read().await;
        let mut documents: Vec<Document> = state
            .documents
            .values()
            .filter(|d| d.knowledge_base_id() == kb_id)
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(documents)
    }

    async fn update_document_status(
        &self,
        id: Uuid,
        status: ParseStatus,
    ) -> Result<bool, KnowledgeError> {
        let mut state = self.state.write().await;

        match state.documents.get_mut(&id) {
            Some(document) => {
                document.set_parse_status(status);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool, KnowledgeError> {
        Ok(self.state.write().await.remove_document(id))
    }

    async fn create_chunks(&self, chunks: &[Chunk]) -> Result<(), KnowledgeError> {
        let mut state = self.state.write().await;

        if let Some(orphan) = chunks
            .iter()
            .find(|c| !state.documents.contains_key(&c.document_id()))
        {
            return Err(KnowledgeError::not_found(format!(
                "Document {} not found",
                orphan.document_id()
            )));
        }

        for chunk in chunks {
            let seq = state.next_seq;
            state.next_seq += 1;
            state.chunks.insert(
                chunk.id(),
                StoredChunk {
                    chunk: chunk.clone(),
                    seq,
                },
            );
        }

        Ok(())
    }

    async fn get_chunk(&self, id: Uuid) -> Result<Option<Chunk>, KnowledgeError> {
        Ok(self
            .state
            .read()
            .await
            .chunks
            .get(&id)
            .map(|c| c.chunk.clone()))
    }

    async fn list_chunks_by_document(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<Chunk>, KnowledgeError> {
        let state = self.state.read().await;
        let mut chunks: Vec<Chunk> = state
            .chunks
            .values()
            .filter(|c| c.chunk.document_id() == document_id)
            .map(|c| c.chunk.clone())
            .collect();
        chunks.sort_by_key(Chunk::chunk_index);
        Ok(chunks)
    }

    async fn count_chunks(&self, kb_id: &KnowledgeBaseId) -> Result<usize, KnowledgeError> {
        let state = self.state.read().await;
        Ok(state
            .chunks
            .values()
            .filter(|c| c.chunk.knowledge_base_id() == kb_id)
            .count())
    }

    async fn set_chunk_enabled(&self, id: Uuid, enabled: bool) -> Result<bool, KnowledgeError> {
        let mut state = self.state.write().await;

        match state.chunks.get_mut(&id) {
            Some(stored) => {
                stored.chunk.set_enabled(enabled);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_chunk(&self, id: Uuid) -> Result<bool, KnowledgeError> {
        Ok(self.state.write().await.remove_chunk(id))
    }

    async fn upsert_embeddings(&self, embeddings: &[Embedding]) -> Result<(), KnowledgeError> {
        let mut state = self.state.write().await;

        if let Some(orphan) = embeddings
            .iter()
            .find(|e| !state.chunks.contains_key(&e.chunk_id()))
        {
            return Err(KnowledgeError::not_found(format!(
                "Chunk {} not found",
                orphan.chunk_id()
            )));
        }

        for embedding in embeddings {
            state
                .embeddings
                .insert(embedding.chunk_id(), embedding.clone());
        }

        Ok(())
    }

    async fn get_embedding_by_chunk(
        &self,
        chunk_id: Uuid,
    ) -> Result<Option<Embedding>, KnowledgeError> {
        Ok(self.state.read().await.embeddings.get(&chunk_id).cloned())
    }

    async fn create_tag(&self, tag: &Tag) -> Result<(), KnowledgeError> {
        let mut state = self.state.write().await;

        if !state.knowledge_bases.contains_key(tag.knowledge_base_id()) {
            return Err(KnowledgeError::not_found(format!(
                "Knowledge base '{}' not found",
                tag.knowledge_base_id()
            )));
        }

        let duplicate = state.tags.values().any(|t| {
            t.knowledge_base_id() == tag.knowledge_base_id() && t.name() == tag.name()
        });
        if duplicate {
            return Err(KnowledgeError::conflict(format!(
                "Tag '{}' already exists in knowledge base '{}'",
                tag.name(),
                tag.knowledge_base_id()
            )));
        }

        state.tags.insert(tag.id(), tag.clone());
        Ok(())
    }

    async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>, KnowledgeError> {
        Ok(self.state.read().await.tags.get(&id).cloned())
    }

    async fn list_tags(&self, kb_id: &KnowledgeBaseId) -> Result<Vec<Tag>, KnowledgeError> {
        let state = self.state.read().await;
        Ok(state.sorted_tags(state.tags.values().filter(|t| t.knowledge_base_id() == kb_id)))
    }

    async fn update_tag(&self, tag: &Tag) -> Result<bool, KnowledgeError> {
        let mut state = self.state.write().await;

        let duplicate = state.tags.values().any(|t| {
            t.id() != tag.id()
                && t.knowledge_base_id() == tag.knowledge_base_id()
                && t.name() == tag.name()
        });
        if duplicate {
            return Err(KnowledgeError::conflict(format!(
                "Tag '{}' already exists in knowledge base '{}'",
                tag.name(),
                tag.knowledge_base_id()
            )));
        }

        match state.tags.get_mut(&tag.id()) {
            Some(existing) => {
                *existing = tag.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_tag(&self, id: Uuid) -> Result<bool, KnowledgeError> {
        Ok(self.state.write().await.remove_tag(id))
    }

    async fn add_tag_to_chunk(&self, chunk_id: Uuid, tag_id: Uuid) -> Result<(), KnowledgeError> {
        let mut state = self.state.write().await;

        let chunk_kb = state
            .chunks
            .get(&chunk_id)
            .map(|c| c.chunk.knowledge_base_id().clone())
            .ok_or_else(|| KnowledgeError::not_found(format!("Chunk {} not found", chunk_id)))?;
        let tag_kb = state
            .tags
            .get(&tag_id)
            .map(|t| t.knowledge_base_id().clone())
            .ok_or_else(|| KnowledgeError::not_found(format!("Tag {} not found", tag_id)))?;

        if chunk_kb != tag_kb {
            return Err(KnowledgeError::validation(
                "Tag and chunk belong to different knowledge bases",
            ));
        }

        state.chunk_tags.insert((chunk_id, tag_id));
        Ok(())
    }

    async fn remove_tag_from_chunk(
        &self,
        chunk_id: Uuid,
        tag_id: Uuid,
    ) -> Result<bool, KnowledgeError> {
        Ok(self.state.write().await.chunk_tags.remove(&(chunk_id, tag_id)))
    }

    async fn list_tags_for_chunk(&self, chunk_id: Uuid) -> Result<Vec<Tag>, KnowledgeError> {
        let state = self.state.read().await;
        let tag_ids: HashSet<Uuid> = state
            .chunk_tags
            .iter()
            .filter(|(chunk, _)| *chunk == chunk_id)
            .map(|(_, tag)| *tag)
            .collect();

        Ok(state.sorted_tags(state.tags.values().filter(|t| tag_ids.contains(&t.id()))))
    }

    async fn list_chunks_for_tag(
        &self,
        tag_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Chunk>, KnowledgeError> {
        let state = self.state.read().await;
        let mut chunks: Vec<Chunk> = state
            .chunk_tags
            .iter()
            .filter(|(_, tag)| *tag == tag_id)
            .filter_map(|(chunk, _)| state.chunks.get(chunk))
            .map(|c| c.chunk.clone())
            .collect();

        chunks.sort_by(|a, b| {
            a.document_id()
                .cmp(&b.document_id())
                .then(a.chunk_index().cmp(&b.chunk_index()))
        });

        Ok(chunks.into_iter().skip(offset).take(limit).collect())
    }

    async fn search_by_vector(
        &self,
        query: &VectorQuery,
    ) -> Result<Vec<ChunkDistance>, KnowledgeError> {
        if query.predicate.is_some() {
            return Err(KnowledgeError::validation(
                "Extra predicates are only supported by SQL stores",
            ));
        }

        let state = self.state.read().await;

        let mut rows: Vec<(u64, ChunkDistance)> = state
            .chunks
            .values()
            .filter(|stored| state.in_scope(stored, &query.scope))
            .filter_map(|stored| {
                let embedding = state.embeddings.get(&stored.chunk.id())?;
                if embedding.dimension() != query.vector.len() {
                    return None;
                }

                let distance =
                    raw_distance(query.distance_function, embedding.vector(), &query.vector);
                Some((
                    stored.seq,
                    ChunkDistance {
                        chunk: stored.chunk.clone(),
                        distance,
                    },
                ))
            })
            .filter(|(_, row)| query.max_distance.is_none_or(|max| row.distance < max))
            .collect();

        rows.sort_by(|a, b| a.1.distance.total_cmp(&b.1.distance).then(a.0.cmp(&b.0)));
        rows.truncate(query.limit);

        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    async fn search_by_full_text(
        &self,
        query: &TextQuery,
    ) -> Result<Vec<ChunkWithScore>, KnowledgeError> {
        let terms: BTreeSet<String> = tokenize(&query.query).into_iter().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.state.read().await;

        let corpus: Vec<(&StoredChunk, Vec<String>)> = state
            .chunks
            .values()
            .filter(|stored| state.in_scope(stored, &query.scope))
            .map(|stored| (stored, tokenize(stored.chunk.content())))
            .collect();

        if corpus.is_empty() {
            return Ok(Vec::new());
        }

        let total = corpus.len() as f64;
        let average_length =
            corpus.iter().map(|(_, tokens)| tokens.len()).sum::<usize>() as f64 / total;

        let idf: HashMap<&str, f64> = terms
            .iter()
            .map(|term| {
                let df = corpus
                    .iter()
                    .filter(|(_, tokens)| tokens.iter().any(|t| t == term))
                    .count() as f64;
                let idf = (1.0 + (total - df + 0.5) / (df + 0.5)).ln();
                (term.as_str(), idf)
            })
            .collect();

        let mut hits: Vec<(u64, f64, &Chunk)> = corpus
            .iter()
            .filter_map(|(stored, tokens)| {
                let length = tokens.len() as f64;
                let mut score = 0.0;

                for term in &terms {
                    let tf = tokens.iter().filter(|t| *t == term).count() as f64;
                    if tf == 0.0 {
                        return None;
                    }

                    let norm = BM25_K1 * (1.0 - BM25_B + BM25_B * length / average_length.max(1.0));
                    score += idf[term.as_str()] * tf * (BM25_K1 + 1.0) / (tf + norm);
                }

                Some((stored.seq, score, &stored.chunk))
            })
            .collect();

        hits.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        hits.truncate(query.limit);

        Ok(hits
            .into_iter()
            .map(|(_, score, chunk)| ChunkWithScore::new(chunk.clone(), (score / (1.0 + score)) as f32))
            .collect())
    }

    async fn health_check(&self) -> Result<bool, KnowledgeError> {
        Ok(true)
    }
}
