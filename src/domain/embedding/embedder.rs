//! Embedder trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::KnowledgeError;

/// Batch text-to-vector function with a fixed output dimensionality
#[async_trait]
pub trait Embedder: Send + Sync + Debug {
    /// Embed all texts in one call
    ///
    /// May return fewer vectors than inputs; vector `i` belongs to text `i`.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError>;

    /// Output dimensionality
    fn dimensions(&self) -> usize;

    /// Model identifier recorded on stored embeddings
    fn model(&self) -> &str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Deterministic embedder: hashes each word into a bucket
    ///
    /// Texts that share words get similar vectors, which is enough for
    /// ranking and breakpoint tests.
    #[derive(Debug, Clone)]
    pub struct MockEmbedder {
        dimensions: usize,
        fixed: HashMap<String, Vec<f32>>,
        max_vectors: Option<usize>,
        error: Option<String>,
        calls: Arc<AtomicUsize>,
    }

    impl MockEmbedder {
        pub fn new(dimensions: usize) -> Self {
            Self {
                dimensions,
                fixed: HashMap::new(),
                max_vectors: None,
                error: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Return `vector` for exactly `text`
        pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
            self.fixed.insert(text.into(), vector);
            self
        }

        /// Return at most `max` vectors per call
        pub fn with_max_vectors(mut self, max: usize) -> Self {
            self.max_vectors = Some(max);
            self
        }

        pub fn with_error(mut self, error: impl Into<String>) -> Self {
            self.error = Some(error.into());
            self
        }

        /// Number of `embed_batch` calls so far
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn vector_for(&self, text: &str) -> Vec<f32> {
            if let Some(vector) = self.fixed.get(text) {
                return vector.clone();
            }

            let mut vector = vec![0.0; self.dimensions];
            for word in text
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
            {
                let hash = word
                    .to_lowercase()
                    .bytes()
                    .fold(2166136261u32, |acc, b| (acc ^ b as u32).wrapping_mul(16777619));
                vector[hash as usize % self.dimensions] += 1.0;
            }
            vector
        }
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(ref error) = self.error {
                return Err(KnowledgeError::embedding(error.clone()));
            }

            let take = self.max_vectors.unwrap_or(texts.len());
            Ok(texts.iter().take(take).map(|t| self.vector_for(t)).collect())
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        fn model(&self) -> &str {
            "mock-embedding"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockEmbedder;
    use super::*;
    use crate::domain::embedding::cosine_similarity;

    #[tokio::test]
    async fn test_mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new(16);
        let texts = vec!["alpha beta".to_string(), "alpha beta".to_string()];

        let vectors = embedder.embed_batch(&texts).await.unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vectors[1]);
        assert_eq!(vectors[0].len(), 16);
        assert_eq!(embedder.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_embedder_shared_words_are_similar() {
        let embedder = MockEmbedder::new(64);
        let texts = vec![
            "cats purr softly".to_string(),
            "cats purr loudly".to_string(),
            "rockets launch upward".to_string(),
        ];

        let v = embedder.embed_batch(&texts).await.unwrap();

        assert!(cosine_similarity(&v[0], &v[1]) > cosine_similarity(&v[0], &v[2]));
    }

    #[tokio::test]
    async fn test_mock_embedder_short_list_and_error() {
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let short = MockEmbedder::new(4).with_max_vectors(2);
        assert_eq!(short.embed_batch(&texts).await.unwrap().len(), 2);

        let failing = MockEmbedder::new(4).with_error("quota exceeded");
        assert!(matches!(
            failing.embed_batch(&texts).await,
            Err(KnowledgeError::Embedding { .. })
        ));
    }
}
