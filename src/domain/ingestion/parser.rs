//! Document parser trait and types

use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;

use crate::domain::knowledge_base::ParserSettings;
use crate::domain::KnowledgeError;

/// Raw file handed to a parser
#[derive(Debug, Clone)]
pub struct ParserInput {
    /// Uploaded bytes
    pub bytes: Vec<u8>,
    /// Original filename
    pub filename: String,
    /// Knowledge base parser options
    pub settings: ParserSettings,
}

impl ParserInput {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
            settings: ParserSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ParserSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Lower-cased extension of the filename, without the dot
    pub fn extension(&self) -> Option<String> {
        file_extension(&self.filename)
    }

    /// Decode the bytes as UTF-8, tolerating a leading byte order mark
    pub fn text(&self) -> Result<String, KnowledgeError> {
        let bytes = self
            .bytes
            .strip_prefix(b"\xEF\xBB\xBF".as_slice())
            .unwrap_or(&self.bytes[..]);

        String::from_utf8(bytes.to_vec()).map_err(|e| {
            KnowledgeError::parse(format!("{} is not valid UTF-8: {}", self.filename, e))
        })
    }
}

/// Plain text extracted from a source
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    /// Extracted text
    pub content: String,
    /// Title found in the source, if any
    pub title: Option<String>,
}

impl ParsedDocument {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Trait for document parsers
#[async_trait]
pub trait DocumentParser: Send + Sync + Debug {
    /// File extensions handled by this parser (lower-case, no dot)
    fn supported_extensions(&self) -> &[&str];

    /// Extract plain text from the raw bytes
    async fn parse(&self, input: &ParserInput) -> Result<ParsedDocument, KnowledgeError>;

    /// Check if this parser handles the given extension
    fn supports_extension(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.supported_extensions().iter().any(|e| *e == extension)
    }
}

/// Lower-cased extension of a filename, without the dot
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("report.PDF"), Some("pdf".to_string()));
        assert_eq!(file_extension("notes.tar.md"), Some("md".to_string()));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn test_text_strips_bom() {
        let input = ParserInput::new("a.txt", b"\xEF\xBB\xBFhello".to_vec());
        assert_eq!(input.text().unwrap(), "hello");
    }

    #[test]
    fn test_text_rejects_invalid_utf8() {
        let input = ParserInput::new("a.txt", vec![0xff, 0xfe, 0x00]);
        assert!(matches!(input.text(), Err(KnowledgeError::Parse { .. })));
    }
}
