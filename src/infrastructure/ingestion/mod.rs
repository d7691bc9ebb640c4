//! Document ingestion infrastructure
//!
//! Parsers, chunkers, the parser registry and the ingestion pipeline.

pub mod chunkers;
pub mod parsers;
pub mod pipeline;
pub mod registry;

pub use chunkers::{RecursiveChunker, SemanticChunker};
pub use parsers::{CsvParser, HtmlParser, PlainTextParser};
pub use pipeline::IngestionPipeline;
pub use registry::{ChunkerFactory, ParserRegistry};
