//! Import sources and the URL loader collaborator

use async_trait::async_trait;

use crate::domain::knowledge_base::SourceType;
use crate::domain::KnowledgeError;

#[cfg(test)]
use mockall::automock;

/// Where the content of an import comes from
#[derive(Debug, Clone)]
pub enum ImportSource {
    /// Remote document fetched through a `UrlLoader`
    Url { uri: String },
    /// Text used verbatim
    Text { content: String },
    /// Uploaded file dispatched to the parser registry by extension
    File { filename: String, bytes: Vec<u8> },
}

impl ImportSource {
    pub fn url(uri: impl Into<String>) -> Self {
        Self::Url { uri: uri.into() }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn file(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::File {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            Self::Url { .. } => SourceType::Url,
            Self::Text { .. } => SourceType::Text,
            Self::File { .. } => SourceType::File,
        }
    }

    /// Locator stored on the document (uri, filename, or nothing for text)
    pub fn locator(&self) -> Option<&str> {
        match self {
            Self::Url { uri } => Some(uri),
            Self::Text { .. } => None,
            Self::File { filename, .. } => Some(filename),
        }
    }
}

/// Fetches a remote document and extracts its plain text
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UrlLoader: Send + Sync {
    async fn load(&self, uri: &str) -> Result<String, KnowledgeError>;
}
