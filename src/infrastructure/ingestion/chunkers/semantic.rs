//! Semantic chunking strategy

use std::sync::Arc;

use async_trait::async_trait;
use unicode_segmentation::UnicodeSegmentation;

use crate::domain::embedding::{cosine_distance, Embedder};
use crate::domain::ingestion::{Chunker, SemanticChunkingConfig, TextChunk};
use crate::domain::KnowledgeError;

/// Cuts text where the meaning shifts
///
/// Each sentence is embedded together with `buffer_size` neighbours on
/// either side (one batch call). A boundary becomes a cut when the cosine
/// distance between adjacent windows is above the configured percentile
/// of all distances seen up to that boundary, and the running chunk has
/// reached `min_chunk_size` characters.
#[derive(Debug, Clone)]
pub struct SemanticChunker {
    config: SemanticChunkingConfig,
    embedder: Arc<dyn Embedder>,
}

impl SemanticChunker {
    pub fn new(config: SemanticChunkingConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self { config, embedder }
    }

    fn sentences(text: &str) -> Vec<&str> {
        text.unicode_sentences()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn windows(&self, sentences: &[&str]) -> Vec<String> {
        let buffer = self.config.buffer_size;

        (0..sentences.len())
            .map(|i| {
                let start = i.saturating_sub(buffer);
                let end = (i + buffer + 1).min(sentences.len());
                sentences[start..end].join(" ")
            })
            .collect()
    }
}

#[async_trait]
impl Chunker for SemanticChunker {
    async fn split(&self, text: &str) -> Result<Vec<TextChunk>, KnowledgeError> {
        self.config.validate()?;

        let sentences = Self::sentences(text);

        if sentences.len() <= 1 {
            return Ok(sentences
                .first()
                .map(|s| vec![TextChunk::new(0, *s)])
                .unwrap_or_default());
        }

        let windows = self.windows(&sentences);
        let vectors = self.embedder.embed_batch(&windows).await?;

        if vectors.len() < windows.len() {
            tracing::warn!(
                windows = windows.len(),
                vectors = vectors.len(),
                "Embedder returned fewer vectors than windows; missing boundaries never cut"
            );
        }

        let mut pieces: Vec<String> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0;
        let mut observed: Vec<f32> = Vec::with_capacity(sentences.len());

        for (i, sentence) in sentences.iter().enumerate() {
            current_len += sentence.chars().count() + usize::from(!current.is_empty());
            current.push(sentence);

            let distance = match (vectors.get(i), vectors.get(i + 1)) {
                (Some(a), Some(b)) => cosine_distance(a, b),
                _ => continue,
            };

            observed.push(distance);
            let threshold = percentile(&observed, self.config.percentile);

            if distance > threshold && current_len >= self.config.min_chunk_size {
                pieces.push(current.join(" "));
                current.clear();
                current_len = 0;
            }
        }

        if !current.is_empty() {
            let tail = current.join(" ");

            match pieces.last_mut() {
                Some(last) if current_len < self.config.min_chunk_size => {
                    last.push(' ');
                    last.push_str(&tail);
                }
                _ => pieces.push(tail),
            }
        }

        tracing::debug!(
            sentences = sentences.len(),
            chunks = pieces.len(),
            "Semantic split complete"
        );

        Ok(pieces
            .into_iter()
            .enumerate()
            .map(|(index, content)| TextChunk::new(index, content))
            .collect())
    }

    fn name(&self) -> &'static str {
        "semantic"
    }
}

/// Linear-interpolated percentile, `p` in [0, 1]
fn percentile(values: &[f32], p: f32) -> f32 {
    if values.is_empty() {
        return f32::INFINITY;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::MockEmbedder;

    const TWO_TOPICS: &str = "Cats purr when happy. Cats purr when fed. Cats purr when warm. \
        Rockets launch into orbit. Rockets launch from pads. Rockets launch at dawn.";

    fn chunker(config: SemanticChunkingConfig, embedder: MockEmbedder) -> SemanticChunker {
        SemanticChunker::new(config, Arc::new(embedder))
    }

    #[test]
    fn test_percentile_interpolates() {
        assert_eq!(percentile(&[0.5], 0.9), 0.5);
        assert!((percentile(&[0.0, 1.0], 0.9) - 0.9).abs() < 1e-6);
        assert!((percentile(&[1.0, 0.25, 0.25], 0.9) - 0.85).abs() < 1e-6);
        assert!(percentile(&[], 0.9).is_infinite());
    }

    #[tokio::test]
    async fn test_cuts_at_topic_shift() {
        let embedder = MockEmbedder::new(256);
        let chunker = chunker(
            SemanticChunkingConfig::default()
                .with_buffer_size(0)
                .with_min_chunk_size(10),
            embedder.clone(),
        );

        let chunks = chunker.split(TWO_TOPICS).await.unwrap();

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.starts_with("Cats purr when happy."));
        assert!(chunks[0].content.ends_with("Cats purr when warm."));
        assert!(chunks[1].content.starts_with("Rockets launch into orbit."));
        assert_eq!(chunks[1].index, 1);
        assert_eq!(embedder.call_count(), 1);
    }

    #[tokio::test]
    async fn test_minimum_size_prevents_cuts() {
        let chunker = chunker(
            SemanticChunkingConfig::default()
                .with_buffer_size(0)
                .with_min_chunk_size(1000),
            MockEmbedder::new(256),
        );

        let chunks = chunker.split(TWO_TOPICS).await.unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_single_sentence_skips_embedding() {
        let embedder = MockEmbedder::new(8);
        let chunker = chunker(SemanticChunkingConfig::default(), embedder.clone());

        let chunks = chunker.split("Just one sentence here.").await.unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Just one sentence here.");
        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_text_yields_no_chunks() {
        let chunker = chunker(SemanticChunkingConfig::default(), MockEmbedder::new(8));
        assert!(chunker.split("  ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedder_failure_propagates() {
        let chunker = chunker(
            SemanticChunkingConfig::default(),
            MockEmbedder::new(8).with_error("offline"),
        );

        let result = chunker.split(TWO_TOPICS).await;
        assert!(matches!(result, Err(KnowledgeError::Embedding { .. })));
    }

    #[tokio::test]
    async fn test_short_vector_list_keeps_text() {
        let chunker = chunker(
            SemanticChunkingConfig::default().with_min_chunk_size(10),
            MockEmbedder::new(256).with_max_vectors(1),
        );

        let chunks = chunker.split(TWO_TOPICS).await.unwrap();

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("Rockets launch at dawn."));
    }
}
