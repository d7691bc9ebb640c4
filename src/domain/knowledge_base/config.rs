//! Typed knowledge base configuration

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::validation::validate_dimensions;
use crate::domain::ingestion::ChunkingOptions;
use crate::domain::KnowledgeError;

/// Embedding model bound to a knowledge base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Model identifier recorded on every stored embedding
    pub model: String,
    /// Expected vector length
    pub dimensions: u32,
}

impl EmbeddingSettings {
    pub fn new(model: impl Into<String>, dimensions: u32) -> Self {
        Self {
            model: model.into(),
            dimensions,
        }
    }
}

/// Options handed to content parsers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserSettings {
    /// Field delimiter for `.csv` sources
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: char,
}

fn default_csv_delimiter() -> char {
    ','
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            csv_delimiter: default_csv_delimiter(),
        }
    }
}

/// Knowledge base configuration
///
/// Known sections are typed; any other top-level key lands in `extensions`
/// and is persisted untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunking: Option<ChunkingOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parser: Option<ParserSettings>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl KnowledgeBaseConfig {
    pub fn with_chunking(mut self, chunking: ChunkingOptions) -> Self {
        self.chunking = Some(chunking);
        self
    }

    pub fn with_embedding(mut self, embedding: EmbeddingSettings) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_parser(mut self, parser: ParserSettings) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    pub fn embedding_dimensions(&self) -> Option<usize> {
        self.embedding.as_ref().map(|e| e.dimensions as usize)
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding.as_ref().map(|e| e.model.as_str())
    }

    /// Check every typed section
    pub fn validate(&self) -> Result<(), KnowledgeError> {
        if let Some(chunking) = &self.chunking {
            chunking.validate()?;
        }

        if let Some(embedding) = &self.embedding {
            validate_dimensions(embedding.dimensions)?;

            if embedding.model.trim().is_empty() {
                return Err(KnowledgeError::validation("Embedding model cannot be empty"));
            }
        }

        Ok(())
    }

    /// Serialize for a JSONB column
    pub fn to_json(&self) -> Result<Value, KnowledgeError> {
        serde_json::to_value(self)
            .map_err(|e| KnowledgeError::validation(format!("Invalid configuration: {}", e)))
    }

    /// Deserialize from a JSONB column
    pub fn from_json(value: Value) -> Result<Self, KnowledgeError> {
        serde_json::from_value(value)
            .map_err(|e| KnowledgeError::validation(format!("Invalid configuration: {}", e)))
    }
}
