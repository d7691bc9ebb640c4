use thiserror::Error;

/// Errors raised by the knowledge engine
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Unsupported source type: {message}")]
    UnsupportedSourceType { message: String },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Embedding unavailable: {message}")]
    EmbeddingUnavailable { message: String },

    #[error("Embedding error: {message}")]
    Embedding { message: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No content left after splitting")]
    EmptyContentAfterSplit,

    #[error("Invalid distance function: {0}")]
    InvalidDistanceFunction(String),

    #[error("Unsafe predicate: {message}")]
    UnsafePredicate { message: String },

    #[error("Store error during {operation}: {message}")]
    Store {
        operation: &'static str,
        message: String,
    },

    #[error("Search error: {message}")]
    Search { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Timed out during {stage}")]
    Timeout { stage: String },
}

impl KnowledgeError {
    pub fn unsupported_source(message: impl Into<String>) -> Self {
        Self::UnsupportedSourceType {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn embedding_unavailable(message: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable {
            message: message.into(),
        }
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    pub fn unsafe_predicate(message: impl Into<String>) -> Self {
        Self::UnsafePredicate {
            message: message.into(),
        }
    }

    /// Wrap a persistence failure, keeping the name of the store operation
    pub fn store(operation: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Store {
            operation,
            message: error.to_string(),
        }
    }

    pub fn search(message: impl Into<String>) -> Self {
        Self::Search {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn timeout(stage: impl Into<String>) -> Self {
        Self::Timeout {
            stage: stage.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_names_operation() {
        let error = KnowledgeError::store("create_chunks", "connection reset");
        assert_eq!(
            error.to_string(),
            "Store error during create_chunks: connection reset"
        );
    }

    #[test]
    fn test_unsafe_predicate_error() {
        let error = KnowledgeError::unsafe_predicate("keyword DROP is not allowed");
        assert_eq!(
            error.to_string(),
            "Unsafe predicate: keyword DROP is not allowed"
        );
    }

    #[test]
    fn test_invalid_distance_function_error() {
        let error = KnowledgeError::InvalidDistanceFunction("manhattan".to_string());
        assert_eq!(error.to_string(), "Invalid distance function: manhattan");
    }

    #[test]
    fn test_dimension_mismatch_error() {
        let error = KnowledgeError::DimensionMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            error.to_string(),
            "Embedding dimension mismatch: expected 3, got 2"
        );
    }
}
