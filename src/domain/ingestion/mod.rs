//! Document ingestion domain types and traits
//!
//! This module provides:
//! - `DocumentParser` trait for turning uploaded files into plain text
//! - `Chunker` trait for splitting text into ordered chunks
//! - `UrlLoader` trait for remote sources
//! - Request, outcome and error types for the ingestion pipeline

pub mod chunker;
pub mod parser;
pub mod pipeline;
pub mod source;

pub use chunker::{
    Chunker, ChunkingOptions, RecursiveChunkingConfig, SemanticChunkingConfig, TextChunk,
    DEFAULT_SEPARATORS,
};
pub use parser::{file_extension, DocumentParser, ParsedDocument, ParserInput};
pub use pipeline::{ImportOutcome, ImportRequest, IngestionError, IngestionStage};
pub use source::{ImportSource, UrlLoader};

#[cfg(test)]
pub use source::MockUrlLoader;
