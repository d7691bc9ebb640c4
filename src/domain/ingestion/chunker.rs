//! Chunking strategy trait and types

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::KnowledgeError;

/// Separator cascade used by the recursive splitter, coarsest first
pub const DEFAULT_SEPARATORS: &[&str] = &[
    "\n\n", "\n", "。", "！", "？", ". ", "! ", "? ", " ", "",
];

/// Configuration for the recursive (size + overlap) splitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecursiveChunkingConfig {
    /// Maximum chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Trailing context carried into the next chunk, in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Ordered separator cascade; the empty string splits per character
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

fn default_chunk_size() -> usize {
    512
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_separators() -> Vec<String> {
    DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect()
}

impl Default for RecursiveChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separators: default_separators(),
        }
    }
}

impl RecursiveChunkingConfig {
    /// Create a configuration with the default separator cascade
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: default_separators(),
        }
    }

    /// Replace the separator cascade
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), KnowledgeError> {
        if self.chunk_size == 0 {
            return Err(KnowledgeError::validation("chunk_size must be greater than 0"));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(KnowledgeError::validation(
                "chunk_overlap must be less than chunk_size",
            ));
        }

        Ok(())
    }
}

/// Configuration for the embedding-similarity splitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticChunkingConfig {
    /// Percentile (0..=1) of observed distances above which a boundary becomes a cut
    #[serde(default = "default_percentile")]
    pub percentile: f32,
    /// Sentences on each side of a sentence that make up its window
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Chunks shorter than this (in characters) are never emitted on their own
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
}

fn default_percentile() -> f32 {
    0.9
}

fn default_buffer_size() -> usize {
    1
}

fn default_min_chunk_size() -> usize {
    100
}

impl Default for SemanticChunkingConfig {
    fn default() -> Self {
        Self {
            percentile: default_percentile(),
            buffer_size: default_buffer_size(),
            min_chunk_size: default_min_chunk_size(),
        }
    }
}

impl SemanticChunkingConfig {
    pub fn with_percentile(mut self, percentile: f32) -> Self {
        self.percentile = percentile;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_min_chunk_size(mut self, min_chunk_size: usize) -> Self {
        self.min_chunk_size = min_chunk_size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), KnowledgeError> {
        if !(0.0..=1.0).contains(&self.percentile) {
            return Err(KnowledgeError::validation(
                "percentile must be between 0.0 and 1.0",
            ));
        }

        Ok(())
    }
}

/// Chunking strategy selection with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ChunkingOptions {
    Recursive(RecursiveChunkingConfig),
    Semantic(SemanticChunkingConfig),
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self::Recursive(RecursiveChunkingConfig::default())
    }
}

impl ChunkingOptions {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Recursive(_) => "recursive",
            Self::Semantic(_) => "semantic",
        }
    }

    pub fn requires_embedder(&self) -> bool {
        matches!(self, Self::Semantic(_))
    }

    pub fn validate(&self) -> Result<(), KnowledgeError> {
        match self {
            Self::Recursive(config) => config.validate(),
            Self::Semantic(config) => config.validate(),
        }
    }
}

/// A piece of text produced by a chunker, in split order
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// Position within the document (0-based)
    pub index: usize,
    /// Chunk text
    pub content: String,
}

impl TextChunk {
    pub fn new(index: usize, content: impl Into<String>) -> Self {
        Self {
            index,
            content: content.into(),
        }
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Trait for chunking strategies
#[async_trait]
pub trait Chunker: Send + Sync + Debug {
    /// Split plain text into ordered chunks
    async fn split(&self, text: &str) -> Result<Vec<TextChunk>, KnowledgeError>;

    /// Strategy name used in logs
    fn name(&self) -> &'static str;
}
