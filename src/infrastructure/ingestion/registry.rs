//! Parser registry and chunker factory

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::embedding::Embedder;
use crate::domain::ingestion::{file_extension, Chunker, ChunkingOptions, DocumentParser};
use crate::domain::KnowledgeError;

use super::chunkers::{RecursiveChunker, SemanticChunker};
use super::parsers::{CsvParser, HtmlParser, PlainTextParser};

/// Maps file extensions to parsers
///
/// Built-in parsers cover text, Markdown, CSV and HTML. Binary formats
/// (`pdf`, `docx`, `xlsx`, `xls`) are only handled once the host
/// registers a parser for them.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn DocumentParser>>,
}

impl ParserRegistry {
    /// Registry without any parser
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in parsers
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(PlainTextParser::new()));
        registry.register(Arc::new(CsvParser::new()));
        registry.register(Arc::new(HtmlParser::new()));
        registry
    }

    /// Register a parser for every extension it supports
    ///
    /// A later registration replaces an earlier one for the same extension.
    pub fn register(&mut self, parser: Arc<dyn DocumentParser>) {
        for extension in parser.supported_extensions() {
            self.parsers
                .insert(extension.to_ascii_lowercase(), Arc::clone(&parser));
        }
    }

    pub fn get(&self, extension: &str) -> Option<Arc<dyn DocumentParser>> {
        self.parsers.get(&extension.to_ascii_lowercase()).cloned()
    }

    /// Parser for a filename, by extension
    pub fn for_filename(&self, filename: &str) -> Result<Arc<dyn DocumentParser>, KnowledgeError> {
        let extension = file_extension(filename).ok_or_else(|| {
            KnowledgeError::unsupported_source(format!("{} has no file extension", filename))
        })?;

        self.get(&extension).ok_or_else(|| {
            KnowledgeError::unsupported_source(format!(
                "no parser registered for .{} files",
                extension
            ))
        })
    }

    /// Registered extensions, sorted
    pub fn extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self.parsers.keys().cloned().collect();
        extensions.sort();
        extensions
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

/// Factory for chunking strategies
#[derive(Debug, Default)]
pub struct ChunkerFactory;

impl ChunkerFactory {
    /// Build the chunker for `options`
    ///
    /// Semantic chunking needs an embedder; without one this fails with
    /// `EmbeddingUnavailable`.
    pub fn create(
        options: &ChunkingOptions,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Arc<dyn Chunker>, KnowledgeError> {
        options.validate()?;

        match options {
            ChunkingOptions::Recursive(config) => {
                Ok(Arc::new(RecursiveChunker::new(config.clone())))
            }
            ChunkingOptions::Semantic(config) => {
                let embedder = embedder.ok_or_else(|| {
                    KnowledgeError::embedding_unavailable(
                        "semantic chunking requires an embedder",
                    )
                })?;
                Ok(Arc::new(SemanticChunker::new(config.clone(), embedder)))
            }
        }
    }
}
