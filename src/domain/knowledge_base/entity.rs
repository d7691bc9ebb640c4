//! Knowledge base entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::KnowledgeBaseConfig;
use super::validation::{validate_knowledge_base_id, KnowledgeBaseValidationError};
use crate::domain::KnowledgeError;

/// Knowledge base identifier - alphanumeric + hyphens, max 50 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KnowledgeBaseId(String);

impl KnowledgeBaseId {
    /// Create a new KnowledgeBaseId after validation
    pub fn new(id: impl Into<String>) -> Result<Self, KnowledgeBaseValidationError> {
        let id = id.into();
        validate_knowledge_base_id(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for KnowledgeBaseId {
    type Error = KnowledgeBaseValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<KnowledgeBaseId> for String {
    fn from(id: KnowledgeBaseId) -> Self {
        id.0
    }
}

impl std::fmt::Display for KnowledgeBaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a knowledge base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeBaseStatus {
    #[default]
    Active,
    Inactive,
}

impl KnowledgeBaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for KnowledgeBaseStatus {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(KnowledgeError::validation(format!(
                "Unknown knowledge base status '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for KnowledgeBaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Knowledge base entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    /// Unique identifier
    id: KnowledgeBaseId,
    /// Display name
    name: String,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    /// Lifecycle status
    status: KnowledgeBaseStatus,
    /// Chunking, parser and embedding configuration
    config: KnowledgeBaseConfig,
    /// Creation timestamp
    created_at: DateTime<Utc>,
    /// Last update timestamp
    updated_at: DateTime<Utc>,
}

impl KnowledgeBase {
    /// Create a new, active knowledge base with an empty configuration
    pub fn new(id: KnowledgeBaseId, name: impl Into<String>) -> Self {
        let now = Utc::now();

        Self {
            id,
            name: name.into(),
            description: None,
            status: KnowledgeBaseStatus::Active,
            config: KnowledgeBaseConfig::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set configuration
    pub fn with_config(mut self, config: KnowledgeBaseConfig) -> Self {
        self.config = config;
        self
    }

    /// Set status
    pub fn with_status(mut self, status: KnowledgeBaseStatus) -> Self {
        self.status = status;
        self
    }

    /// Restore persisted timestamps
    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    // Getters

    pub fn id(&self) -> &KnowledgeBaseId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn status(&self) -> KnowledgeBaseStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == KnowledgeBaseStatus::Active
    }

    pub fn config(&self) -> &KnowledgeBaseConfig {
        &self.config
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Mutators

    /// Update the name
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    /// Update the description
    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
        self.touch();
    }

    /// Update the configuration
    pub fn set_config(&mut self, config: KnowledgeBaseConfig) {
        self.config = config;
        self.touch();
    }

    /// Activate or deactivate
    pub fn set_status(&mut self, status: KnowledgeBaseStatus) {
        self.status = status;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::knowledge_base::EmbeddingSettings;

    #[test]
    fn test_knowledge_base_id_rejects_invalid() {
        assert!(KnowledgeBaseId::new("docs").is_ok());
        assert!(KnowledgeBaseId::new("bad id").is_err());
    }

    #[test]
    fn test_knowledge_base_id_deserialization_validates() {
        let ok: Result<KnowledgeBaseId, _> = serde_json::from_str("\"product-docs\"");
        assert!(ok.is_ok());

        let bad: Result<KnowledgeBaseId, _> = serde_json::from_str("\"product docs\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_knowledge_base_builder() {
        let kb = KnowledgeBase::new(KnowledgeBaseId::new("docs").unwrap(), "Docs")
            .with_description("Product documentation")
            .with_config(
                KnowledgeBaseConfig::default()
                    .with_embedding(EmbeddingSettings::new("text-embedding-3-small", 1536)),
            );

        assert_eq!(kb.id().as_str(), "docs");
        assert_eq!(kb.name(), "Docs");
        assert_eq!(kb.description(), Some("Product documentation"));
        assert!(kb.is_active());
        assert_eq!(kb.config().embedding_dimensions(), Some(1536));
    }

    #[test]
    fn test_set_status_touches_updated_at() {
        let mut kb = KnowledgeBase::new(KnowledgeBaseId::new("docs").unwrap(), "Docs");
        let before = kb.updated_at();

        kb.set_status(KnowledgeBaseStatus::Inactive);

        assert!(!kb.is_active());
        assert!(kb.updated_at() >= before);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            "inactive".parse::<KnowledgeBaseStatus>().unwrap(),
            KnowledgeBaseStatus::Inactive
        );
        assert!("archived".parse::<KnowledgeBaseStatus>().is_err());
    }
}
