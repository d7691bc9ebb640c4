//! Vector similarity search over stored embeddings

use std::sync::Arc;
use std::time::Instant;

use crate::domain::knowledge_base::{
    validate_limit, ChunkWithScore, KnowledgeStore, SafePredicate, SearchScope, VectorQuery,
    VectorSearchOptions,
};
use crate::domain::KnowledgeError;
use crate::infrastructure::metrics::record_search;

/// Runs vector queries against a knowledge store and normalises the scores
#[derive(Debug, Clone)]
pub struct VectorSearchEngine {
    store: Arc<dyn KnowledgeStore>,
}

impl VectorSearchEngine {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }

    /// Validate caller input and turn it into a store query
    ///
    /// The extra predicate is screened before anything reaches the store,
    /// and the score threshold is moved into distance space.
    pub fn prepare(
        scope: SearchScope,
        vector: Vec<f32>,
        limit: usize,
        options: &VectorSearchOptions,
    ) -> Result<VectorQuery, KnowledgeError> {
        if vector.is_empty() {
            return Err(KnowledgeError::search("query vector is empty"));
        }

        let predicate = match options.extra_predicate.as_deref() {
            Some(raw) => SafePredicate::parse(raw)?,
            None => None,
        };

        let distance_function = options.distance_function;
        let max_distance = options
            .score_threshold
            .map(|threshold| distance_function.distance_threshold(threshold));

        Ok(VectorQuery {
            scope,
            vector,
            limit,
            distance_function,
            max_distance,
            predicate,
        })
    }

    /// Nearest chunks to `vector`, most relevant first
    pub async fn search(
        &self,
        scope: SearchScope,
        vector: Vec<f32>,
        limit: usize,
        options: &VectorSearchOptions,
    ) -> Result<Vec<ChunkWithScore>, KnowledgeError> {
        validate_limit(limit)?;
        let query = Self::prepare(scope, vector, limit, options)?;

        let start = Instant::now();
        let result = self.store.search_by_vector(&query).await;
        let duration = start.elapsed();

        let rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                record_search("vector", duration, false, 0);
                return Err(e);
            }
        };

        let distance_function = query.distance_function;
        let hits: Vec<ChunkWithScore> = rows
            .into_iter()
            .map(|row| ChunkWithScore::new(row.chunk, distance_function.score(row.distance)))
            .collect();

        tracing::debug!(
            store = self.store.store_type(),
            distance_function = %distance_function,
            results = hits.len(),
            "Vector search completed"
        );
        record_search("vector", duration, true, hits.len());

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::knowledge_base::{
        Chunk, DistanceFunction, Document, Embedding, KnowledgeBase, KnowledgeBaseId, SourceType,
    };
    use crate::infrastructure::knowledge_base::InMemoryKnowledgeStore;

    fn kb_id() -> KnowledgeBaseId {
        KnowledgeBaseId::new("kb").unwrap()
    }

    async fn store_with(vectors: &[(&str, Vec<f32>)]) -> Arc<InMemoryKnowledgeStore> {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store
            .create_knowledge_base(&KnowledgeBase::new(kb_id(), "KB"))
            .await
            .unwrap();
        let document = Document::new(kb_id(), SourceType::Text, "hash");
        store.create_document(&document).await.unwrap();

        for (index, (content, vector)) in vectors.iter().enumerate() {
            let chunk = Chunk::new(kb_id(), document.id(), index, *content);
            store.create_chunks(std::slice::from_ref(&chunk)).await.unwrap();
            store
                .upsert_embeddings(&[Embedding::new(kb_id(), chunk.id(), vector.clone(), "test")])
                .await
                .unwrap();
        }

        store
    }

    #[tokio::test]
    async fn test_scores_are_higher_is_better() {
        let store = store_with(&[
            ("near", vec![1.0, 0.0]),
            ("far", vec![0.0, 1.0]),
            ("middle", vec![1.0, 1.0]),
        ])
        .await;
        let engine = VectorSearchEngine::new(store);

        for distance_function in [
            DistanceFunction::Cosine,
            DistanceFunction::L2,
            DistanceFunction::InnerProduct,
        ] {
            let options = VectorSearchOptions::default().with_distance_function(distance_function);
            let hits = engine
                .search(SearchScope::knowledge_base(kb_id()), vec![1.0, 0.0], 3, &options)
                .await
                .unwrap();

            assert_eq!(hits.len(), 3);
            assert!(hits.iter().all(|h| h.score >= 0.0 && h.score <= 1.0));
            assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }

    #[tokio::test]
    async fn test_inner_product_separates_strong_and_weak_matches() {
        let store = store_with(&[("weak", vec![0.05, 0.0]), ("strong", vec![0.95, 0.0])]).await;
        let engine = VectorSearchEngine::new(store);

        let options =
            VectorSearchOptions::default().with_distance_function(DistanceFunction::InnerProduct);
        let hits = engine
            .search(SearchScope::knowledge_base(kb_id()), vec![1.0, 0.0], 2, &options)
            .await
            .unwrap();

        assert_eq!(hits[0].chunk.content(), "strong");
        assert_eq!(hits[1].chunk.content(), "weak");
        assert!(hits[0].score > hits[1].score);
        assert!(hits[0].score < 1.0);
    }

    #[tokio::test]
    async fn test_cosine_threshold_filters_in_score_space() {
        let store = store_with(&[("same", vec![1.0, 0.0]), ("orthogonal", vec![0.0, 1.0])]).await;
        let engine = VectorSearchEngine::new(store);

        let options = VectorSearchOptions::default().with_score_threshold(0.5);
        let hits = engine
            .search(SearchScope::knowledge_base(kb_id()), vec![1.0, 0.0], 10, &options)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.content(), "same");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unsafe_predicate_never_reaches_the_store() {
        let store = store_with(&[("a", vec![1.0])]).await;
        let engine = VectorSearchEngine::new(store);

        let options = VectorSearchOptions::default().with_extra_predicate("1=1; DROP TABLE chunks");
        let result = engine
            .search(SearchScope::knowledge_base(kb_id()), vec![1.0], 5, &options)
            .await;

        // The in-memory store answers any predicate with Validation, so
        // UnsafePredicate proves the query was rejected up front.
        assert!(matches!(result, Err(KnowledgeError::UnsafePredicate { .. })));
    }

    #[tokio::test]
    async fn test_empty_vector_and_bad_limit_are_rejected() {
        let engine = VectorSearchEngine::new(store_with(&[]).await);
        let scope = SearchScope::knowledge_base(kb_id());
        let options = VectorSearchOptions::default();

        let empty = engine.search(scope.clone(), Vec::new(), 5, &options).await;
        assert!(matches!(empty, Err(KnowledgeError::Search { .. })));

        let zero = engine.search(scope, vec![1.0], 0, &options).await;
        assert!(matches!(zero, Err(KnowledgeError::Validation { .. })));
    }

    #[test]
    fn test_prepare_converts_threshold() {
        let options = VectorSearchOptions::default()
            .with_distance_function(DistanceFunction::L2)
            .with_score_threshold(0.4);

        let query = VectorSearchEngine::prepare(SearchScope::default(), vec![1.0], 3, &options).unwrap();

        assert_eq!(query.max_distance, Some(0.4_f32 as f64));
        assert!(query.predicate.is_none());
    }
}
