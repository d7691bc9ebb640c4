//! Knowledge base validation utilities

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::KnowledgeError;

/// Maximum length for knowledge base IDs
pub const MAX_KB_ID_LENGTH: usize = 50;

/// Maximum length for tag names
pub const MAX_TAG_NAME_LENGTH: usize = 64;

/// Upper bound for a single search request
pub const MAX_SEARCH_LIMIT: usize = 1000;

static KB_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9]$|^[a-zA-Z0-9]$").unwrap());

static TAG_COLOR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap());

/// Knowledge base validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum KnowledgeBaseValidationError {
    /// ID is empty
    EmptyId,
    /// ID exceeds maximum length
    IdTooLong { length: usize, max: usize },
    /// ID contains invalid characters
    InvalidIdFormat { id: String },
    /// Invalid embedding dimensions
    InvalidDimensions { value: u32, min: u32, max: u32 },
    /// Tag name is empty or too long
    InvalidTagName { name: String },
    /// Tag color is not a hex color
    InvalidTagColor { color: String },
    /// Search limit out of range
    InvalidLimit { value: usize, max: usize },
    /// Fusion weight is negative or not finite
    InvalidWeight { name: &'static str, value: f32 },
}

impl fmt::Display for KnowledgeBaseValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "Knowledge base ID cannot be empty"),
            Self::IdTooLong { length, max } => {
                write!(
                    f,
                    "Knowledge base ID too long: {} characters (max {})",
                    length, max
                )
            }
            Self::InvalidIdFormat { id } => {
                write!(
                    f,
                    "Invalid knowledge base ID format '{}': must be alphanumeric with hyphens",
                    id
                )
            }
            Self::InvalidDimensions { value, min, max } => {
                write!(
                    f,
                    "Invalid embedding dimensions {}: must be between {} and {}",
                    value, min, max
                )
            }
            Self::InvalidTagName { name } => {
                write!(
                    f,
                    "Invalid tag name '{}': must be 1 to {} characters",
                    name, MAX_TAG_NAME_LENGTH
                )
            }
            Self::InvalidTagColor { color } => {
                write!(f, "Invalid tag color '{}': expected #RGB or #RRGGBB", color)
            }
            Self::InvalidLimit { value, max } => {
                write!(f, "Invalid limit {}: must be between 1 and {}", value, max)
            }
            Self::InvalidWeight { name, value } => {
                write!(f, "Invalid {} {}: must be a non-negative number", name, value)
            }
        }
    }
}

impl std::error::Error for KnowledgeBaseValidationError {}

impl From<KnowledgeBaseValidationError> for KnowledgeError {
    fn from(error: KnowledgeBaseValidationError) -> Self {
        KnowledgeError::validation(error.to_string())
    }
}

/// Validate a knowledge base ID
pub fn validate_knowledge_base_id(id: &str) -> Result<(), KnowledgeBaseValidationError> {
    if id.is_empty() {
        return Err(KnowledgeBaseValidationError::EmptyId);
    }

    if id.len() > MAX_KB_ID_LENGTH {
        return Err(KnowledgeBaseValidationError::IdTooLong {
            length: id.len(),
            max: MAX_KB_ID_LENGTH,
        });
    }

    if !KB_ID_PATTERN.is_match(id) {
        return Err(KnowledgeBaseValidationError::InvalidIdFormat { id: id.to_string() });
    }

    Ok(())
}

/// Validate embedding dimensions
pub fn validate_dimensions(dims: u32) -> Result<(), KnowledgeBaseValidationError> {
    const MIN: u32 = 1;
    const MAX: u32 = 16000; // pgvector column limit

    if !(MIN..=MAX).contains(&dims) {
        return Err(KnowledgeBaseValidationError::InvalidDimensions {
            value: dims,
            min: MIN,
            max: MAX,
        });
    }

    Ok(())
}

/// Validate a tag name
pub fn validate_tag_name(name: &str) -> Result<(), KnowledgeBaseValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() || trimmed.chars().count() > MAX_TAG_NAME_LENGTH {
        return Err(KnowledgeBaseValidationError::InvalidTagName {
            name: name.to_string(),
        });
    }

    Ok(())
}

/// Validate a tag display color
pub fn validate_tag_color(color: &str) -> Result<(), KnowledgeBaseValidationError> {
    if !TAG_COLOR_PATTERN.is_match(color) {
        return Err(KnowledgeBaseValidationError::InvalidTagColor {
            color: color.to_string(),
        });
    }

    Ok(())
}

/// Validate a search limit
pub fn validate_limit(limit: usize) -> Result<(), KnowledgeBaseValidationError> {
    if limit == 0 || limit > MAX_SEARCH_LIMIT {
        return Err(KnowledgeBaseValidationError::InvalidLimit {
            value: limit,
            max: MAX_SEARCH_LIMIT,
        });
    }

    Ok(())
}

/// Validate a hybrid fusion weight
pub fn validate_weight(name: &'static str, value: f32) -> Result<(), KnowledgeBaseValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(KnowledgeBaseValidationError::InvalidWeight { name, value });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_kb_ids() {
        assert!(validate_knowledge_base_id("a").is_ok());
        assert!(validate_knowledge_base_id("my-kb").is_ok());
        assert!(validate_knowledge_base_id("product-docs-v1").is_ok());
        assert!(validate_knowledge_base_id("KB123").is_ok());
    }

    #[test]
    fn test_invalid_kb_ids() {
        assert!(matches!(
            validate_knowledge_base_id(""),
            Err(KnowledgeBaseValidationError::EmptyId)
        ));

        let long_id = "a".repeat(51);
        assert!(matches!(
            validate_knowledge_base_id(&long_id),
            Err(KnowledgeBaseValidationError::IdTooLong { .. })
        ));

        assert!(matches!(
            validate_knowledge_base_id("my_kb"),
            Err(KnowledgeBaseValidationError::InvalidIdFormat { .. })
        ));
    }

    #[test]
    fn test_dimensions_validation() {
        assert!(validate_dimensions(3).is_ok());
        assert!(validate_dimensions(1536).is_ok());

        assert!(validate_dimensions(0).is_err());
        assert!(validate_dimensions(20000).is_err());
    }

    #[test]
    fn test_tag_validation() {
        assert!(validate_tag_name("billing").is_ok());
        assert!(validate_tag_name("   ").is_err());
        assert!(validate_tag_name(&"x".repeat(65)).is_err());

        assert!(validate_tag_color("#fff").is_ok());
        assert!(validate_tag_color("#1A2b3C").is_ok());
        assert!(validate_tag_color("red").is_err());
        assert!(validate_tag_color("#12345").is_err());
    }

    #[test]
    fn test_limit_and_weight_validation() {
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(1001).is_err());

        assert!(validate_weight("vector_weight", 0.0).is_ok());
        assert!(validate_weight("vector_weight", -0.1).is_err());
        assert!(validate_weight("text_weight", f32::NAN).is_err());
    }

    #[test]
    fn test_validation_error_converts_to_knowledge_error() {
        let error: KnowledgeError = KnowledgeBaseValidationError::EmptyId.into();
        assert_eq!(
            error.to_string(),
            "Validation error: Knowledge base ID cannot be empty"
        );
    }
}
