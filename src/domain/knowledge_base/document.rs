//! Knowledge base document entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::entity::KnowledgeBaseId;
use crate::domain::KnowledgeError;

/// Hex SHA-256 fingerprint of raw content
///
/// Used for change detection only; equal hashes are never rejected.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Kind of source a document was imported from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    File,
    Url,
    Text,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Url => "url",
            Self::Text => "text",
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "url" => Ok(Self::Url),
            "text" => Ok(Self::Text),
            other => Err(KnowledgeError::unsupported_source(other.to_string())),
        }
    }
}

/// Parse status of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Pending,
    Parsed,
    Failed,
}

impl ParseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Parsed => "parsed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ParseStatus {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "parsed" => Ok(Self::Parsed),
            "failed" => Ok(Self::Failed),
            other => Err(KnowledgeError::validation(format!(
                "Unknown parse status '{}'",
                other
            ))),
        }
    }
}

/// A document stored in a knowledge base
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    id: Uuid,
    knowledge_base_id: KnowledgeBaseId,
    source_type: SourceType,
    source_locator: Option<String>,
    title: Option<String>,
    content_hash: String,
    parse_status: ParseStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a pending document
    pub fn new(
        knowledge_base_id: KnowledgeBaseId,
        source_type: SourceType,
        content_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            knowledge_base_id,
            source_type,
            source_locator: None,
            title: None,
            content_hash: content_hash.into(),
            parse_status: ParseStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create with specific ID (for loading from DB)
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_source_locator(mut self, locator: impl Into<String>) -> Self {
        self.source_locator = Some(locator.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_parse_status(mut self, status: ParseStatus) -> Self {
        self.parse_status = status;
        self
    }

    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    // Getters
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn knowledge_base_id(&self) -> &KnowledgeBaseId {
        &self.knowledge_base_id
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn source_locator(&self) -> Option<&str> {
        self.source_locator.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn parse_status(&self) -> ParseStatus {
        self.parse_status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set_parse_status(&mut self, status: ParseStatus) {
        self.parse_status = status;
        self.updated_at = Utc::now();
    }
}
