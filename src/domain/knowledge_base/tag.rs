//! Tags and chunk-tag associations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::KnowledgeBaseId;
use super::validation::{validate_tag_color, validate_tag_name};
use crate::domain::KnowledgeError;

/// Default display color for new tags
pub const DEFAULT_TAG_COLOR: &str = "#6b7280";

/// A label scoped to a knowledge base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    id: Uuid,
    knowledge_base_id: KnowledgeBaseId,
    name: String,
    color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Tag {
    /// Create a tag after validating its name
    pub fn new(
        knowledge_base_id: KnowledgeBaseId,
        name: impl Into<String>,
    ) -> Result<Self, KnowledgeError> {
        let name = name.into();
        validate_tag_name(&name)?;
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4(),
            knowledge_base_id,
            name: name.trim().to_string(),
            color: DEFAULT_TAG_COLOR.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Create with specific ID (for loading from DB)
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Result<Self, KnowledgeError> {
        let color = color.into();
        validate_tag_color(&color)?;
        self.color = color;
        Ok(self)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn knowledge_base_id(&self) -> &KnowledgeBaseId {
        &self.knowledge_base_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Apply a partial update
    pub fn apply(&mut self, update: TagUpdate) -> Result<(), KnowledgeError> {
        if let Some(name) = update.name {
            validate_tag_name(&name)?;
            self.name = name.trim().to_string();
        }

        if let Some(color) = update.color {
            validate_tag_color(&color)?;
            self.color = color;
        }

        if let Some(description) = update.description {
            self.description = if description.is_empty() {
                None
            } else {
                Some(description)
            };
        }

        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Partial tag update; `None` leaves a field unchanged, an empty description clears it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
}

/// Association between a chunk and a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkTag {
    pub chunk_id: Uuid,
    pub tag_id: Uuid,
}

impl ChunkTag {
    pub fn new(chunk_id: Uuid, tag_id: Uuid) -> Self {
        Self { chunk_id, tag_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kb() -> KnowledgeBaseId {
        KnowledgeBaseId::new("kb").unwrap()
    }

    #[test]
    fn test_new_tag_trims_name_and_uses_default_color() {
        let tag = Tag::new(kb(), "  billing ").unwrap();
        assert_eq!(tag.name(), "billing");
        assert_eq!(tag.color(), DEFAULT_TAG_COLOR);
    }

    #[test]
    fn test_new_tag_rejects_blank_name() {
        assert!(matches!(
            Tag::new(kb(), " "),
            Err(KnowledgeError::Validation { .. })
        ));
    }

    #[test]
    fn test_apply_partial_update() {
        let mut tag = Tag::new(kb(), "faq")
            .unwrap()
            .with_description("Frequently asked");

        tag.apply(TagUpdate {
            color: Some("#ff0000".to_string()),
            description: Some(String::new()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(tag.name(), "faq");
        assert_eq!(tag.color(), "#ff0000");
        assert_eq!(tag.description(), None);
    }

    #[test]
    fn test_apply_rejects_bad_color() {
        let mut tag = Tag::new(kb(), "faq").unwrap();
        let result = tag.apply(TagUpdate {
            color: Some("blue".to_string()),
            ..Default::default()
        });

        assert!(result.is_err());
        assert_eq!(tag.color(), DEFAULT_TAG_COLOR);
    }
}
