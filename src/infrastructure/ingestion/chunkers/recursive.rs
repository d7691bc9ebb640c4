//! Recursive chunking strategy

use std::collections::VecDeque;

use async_trait::async_trait;
use unicode_segmentation::UnicodeSegmentation;

use crate::domain::ingestion::{Chunker, RecursiveChunkingConfig, TextChunk};
use crate::domain::KnowledgeError;

/// Splits text by walking a separator cascade
///
/// The first separator present in a span splits it; pieces that still
/// exceed `chunk_size` are split again with the remaining separators.
/// Fitting pieces are packed greedily and the trailing pieces of each
/// chunk, up to `chunk_overlap` characters, start the next one.
#[derive(Debug, Clone, Default)]
pub struct RecursiveChunker {
    config: RecursiveChunkingConfig,
}

impl RecursiveChunker {
    /// Create a new recursive chunker
    pub fn new(config: RecursiveChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecursiveChunkingConfig {
        &self.config
    }

    fn split_text(&self, text: &str, separators: &[String]) -> Vec<String> {
        let Some(position) = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()))
        else {
            return vec![text.to_string()];
        };

        let separator = &separators[position];
        let remaining = &separators[position + 1..];

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) <= self.config.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }

            if remaining.is_empty() {
                push_trimmed(&mut chunks, piece);
            } else {
                chunks.extend(self.split_text(piece, remaining));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }

        chunks
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > size && !window.is_empty() {
                let joined: String = window.iter().map(|(p, _)| *p).collect();
                push_trimmed(&mut chunks, &joined);

                while total > overlap || (total + len > size && total > 0) {
                    match window.pop_front() {
                        Some((_, popped)) => total -= popped,
                        None => break,
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        if !window.is_empty() {
            let joined: String = window.iter().map(|(p, _)| *p).collect();
            push_trimmed(&mut chunks, &joined);
        }

        chunks
    }
}

#[async_trait]
impl Chunker for RecursiveChunker {
    async fn split(&self, text: &str) -> Result<Vec<TextChunk>, KnowledgeError> {
        self.config.validate()?;

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let pieces = if char_len(text) <= self.config.chunk_size {
            vec![text.trim().to_string()]
        } else {
            self.split_text(text, &self.config.separators)
        };

        Ok(pieces
            .into_iter()
            .enumerate()
            .map(|(index, content)| TextChunk::new(index, content))
            .collect())
    }

    fn name(&self) -> &'static str {
        "recursive"
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn push_trimmed(chunks: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split after every occurrence of `separator`, keeping it on the left piece
///
/// The empty separator splits into grapheme clusters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text.graphemes(true).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;

    for (position, _) in text.match_indices(separator) {
        let end = position + separator.len();
        pieces.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> RecursiveChunker {
        RecursiveChunker::new(RecursiveChunkingConfig::new(size, overlap))
    }

    fn contents(chunks: &[TextChunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.content.as_str()).collect()
    }

    #[tokio::test]
    async fn test_empty_content() {
        let chunks = chunker(20, 0).split("   \n ").await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_small_content_is_one_chunk() {
        let chunks = chunker(100, 10).split("  Hello, world.  ").await.unwrap();
        assert_eq!(contents(&chunks), vec!["Hello, world."]);
        assert_eq!(chunks[0].index, 0);
    }

    #[tokio::test]
    async fn test_splits_on_sentence_boundary() {
        let chunks = chunker(20, 0)
            .split("Alpha Alpha Alpha. Beta Beta Beta.")
            .await
            .unwrap();

        assert_eq!(contents(&chunks), vec!["Alpha Alpha Alpha.", "Beta Beta Beta."]);
        assert_eq!(chunks[1].index, 1);
    }

    #[tokio::test]
    async fn test_paragraphs_take_precedence() {
        let text = "First paragraph here.\n\nSecond paragraph here.";
        let chunks = chunker(30, 0).split(text).await.unwrap();

        assert_eq!(
            contents(&chunks),
            vec!["First paragraph here.", "Second paragraph here."]
        );
    }

    #[tokio::test]
    async fn test_overlap_carries_trailing_words() {
        let chunks = chunker(10, 5).split("aaaa bbbb cccc dddd").await.unwrap();

        assert_eq!(
            contents(&chunks),
            vec!["aaaa bbbb", "bbbb cccc", "cccc dddd"]
        );
    }

    #[tokio::test]
    async fn test_long_word_falls_back_to_characters() {
        let chunks = chunker(4, 0).split("abcdefghij").await.unwrap();
        assert_eq!(contents(&chunks), vec!["abcd", "efgh", "ij"]);
    }

    #[tokio::test]
    async fn test_cjk_sentence_enders() {
        let chunks = chunker(5, 0).split("第一句。第二句。第三句。").await.unwrap();
        assert_eq!(contents(&chunks), vec!["第一句。", "第二句。", "第三句。"]);
    }

    #[tokio::test]
    async fn test_custom_separators_without_fallback_keep_oversized_piece() {
        let chunker = RecursiveChunker::new(
            RecursiveChunkingConfig::new(5, 0).with_separators(["|"]),
        );

        let chunks = chunker.split("ab|cdefghij|kl").await.unwrap();
        assert_eq!(contents(&chunks), vec!["ab|", "cdefghij|", "kl"]);
    }

    #[tokio::test]
    async fn test_indices_are_dense() {
        let text = "one two three four five six seven eight nine ten eleven twelve";
        let chunks = chunker(12, 4).split(text).await.unwrap();

        for (expected, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, expected);
            assert!(chunk.char_len() <= 12);
        }
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let result = chunker(10, 10).split("anything").await;
        assert!(matches!(result, Err(KnowledgeError::Validation { .. })));
    }
}
