//! Lexical search

use std::sync::Arc;
use std::time::Instant;

use crate::domain::knowledge_base::{
    validate_limit, ChunkWithScore, KnowledgeStore, SearchScope, TextQuery,
};
use crate::domain::KnowledgeError;
use crate::infrastructure::metrics::record_search;

/// Runs full-text queries against a knowledge store
#[derive(Debug, Clone)]
pub struct FullTextSearchEngine {
    store: Arc<dyn KnowledgeStore>,
}

impl FullTextSearchEngine {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }

    /// Chunks matching `query`, best lexical match first
    ///
    /// A blank query has nothing to match and yields no results.
    pub async fn search(
        &self,
        scope: SearchScope,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ChunkWithScore>, KnowledgeError> {
        validate_limit(limit)?;

        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let text_query = TextQuery {
            scope,
            query: query.to_string(),
            limit,
        };

        let start = Instant::now();
        let result = self.store.search_by_full_text(&text_query).await;
        let result_count = result.as_ref().map(Vec::len).unwrap_or(0);
        record_search("full_text", start.elapsed(), result.is_ok(), result_count);

        if let Ok(hits) = &result {
            tracing::debug!(
                store = self.store.store_type(),
                results = hits.len(),
                "Full-text search completed"
            );
        }

        result
    }
}
