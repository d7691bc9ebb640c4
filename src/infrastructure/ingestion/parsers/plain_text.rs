//! Plain text and Markdown parser

use async_trait::async_trait;

use crate::domain::ingestion::{DocumentParser, ParsedDocument, ParserInput};
use crate::domain::KnowledgeError;

/// Reads text files verbatim
///
/// Markdown is kept as written; its structure is useful to the chunker.
#[derive(Debug, Clone, Default)]
pub struct PlainTextParser;

impl PlainTextParser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentParser for PlainTextParser {
    fn supported_extensions(&self) -> &[&str] {
        &["txt", "text", "md", "markdown"]
    }

    async fn parse(&self, input: &ParserInput) -> Result<ParsedDocument, KnowledgeError> {
        Ok(ParsedDocument::new(input.text()?))
    }
}
