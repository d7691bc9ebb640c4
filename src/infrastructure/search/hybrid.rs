//! Weighted fusion of vector and full-text search

use std::sync::Arc;
use std::time::Instant;

use crate::domain::knowledge_base::{
    validate_limit, validate_weight, ChunkWithScore, HybridQuery, HybridWeights, KnowledgeStore,
    SearchScope, TextQuery, VectorSearchOptions,
};
use crate::domain::KnowledgeError;
use crate::infrastructure::metrics::record_search;

use super::vector::VectorSearchEngine;

/// Candidates requested from each leg per final result
pub const HYBRID_OVERSAMPLE: usize = 2;

/// One hybrid search call
#[derive(Debug, Clone)]
pub struct HybridSearchRequest {
    pub scope: SearchScope,
    pub query: String,
    pub vector: Vec<f32>,
    pub limit: usize,
    pub weights: HybridWeights,
    pub vector_options: VectorSearchOptions,
}

impl HybridSearchRequest {
    pub fn new(scope: SearchScope, query: impl Into<String>, vector: Vec<f32>, limit: usize) -> Self {
        Self {
            scope,
            query: query.into(),
            vector,
            limit,
            weights: HybridWeights::default(),
            vector_options: VectorSearchOptions::default(),
        }
    }

    pub fn with_weights(mut self, weights: HybridWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_vector_options(mut self, options: VectorSearchOptions) -> Self {
        self.vector_options = options;
        self
    }
}

/// Hybrid search engine
///
/// Both legs run against the store with `HYBRID_OVERSAMPLE * limit`
/// candidates; a failure in either leg fails the call.
#[derive(Debug, Clone)]
pub struct HybridSearchEngine {
    store: Arc<dyn KnowledgeStore>,
}

impl HybridSearchEngine {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }

    pub async fn search(
        &self,
        request: HybridSearchRequest,
    ) -> Result<Vec<ChunkWithScore>, KnowledgeError> {
        validate_limit(request.limit)?;
        validate_weight("vector_weight", request.weights.vector_weight)?;
        validate_weight("text_weight", request.weights.text_weight)?;

        let candidates = request.limit.saturating_mul(HYBRID_OVERSAMPLE);
        let vector = VectorSearchEngine::prepare(
            request.scope.clone(),
            request.vector,
            candidates,
            &request.vector_options,
        )?;
        let text = TextQuery {
            scope: request.scope,
            query: request.query.trim().to_string(),
            limit: candidates,
        };

        let query = HybridQuery {
            vector,
            text,
            weights: request.weights,
            limit: request.limit,
        };

        let start = Instant::now();
        let result = self.store.search_hybrid(&query).await;
        let result_count = result.as_ref().map(Vec::len).unwrap_or(0);
        record_search("hybrid", start.elapsed(), result.is_ok(), result_count);

        match &result {
            Ok(hits) => tracing::debug!(
                store = self.store.store_type(),
                vector_weight = query.weights.vector_weight,
                text_weight = query.weights.text_weight,
                results = hits.len(),
                "Hybrid search completed"
            ),
            Err(e) => tracing::error!(error = %e, "Hybrid search failed"),
        }

        result
    }
}
