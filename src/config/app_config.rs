use std::time::Duration;

use serde::Deserialize;

use crate::domain::ingestion::{ChunkingOptions, RecursiveChunkingConfig, SemanticChunkingConfig};
use crate::domain::knowledge_base::{DistanceFunction, HybridWeights};
use crate::infrastructure::storage::{PostgresConfig, StorageType};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: PostgresConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub ingestion: IngestionConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Ingestion defaults, used when neither the request nor the knowledge base picks a strategy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub semantic_percentile: f32,
    pub semantic_buffer_size: usize,
    pub semantic_min_chunk_size: usize,
    /// Upper bound for each parse, embed and store call
    pub stage_timeout_secs: Option<u64>,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
            semantic_percentile: 0.9,
            semantic_buffer_size: 1,
            semantic_min_chunk_size: 100,
            stage_timeout_secs: None,
        }
    }
}

impl IngestionConfig {
    pub fn recursive(&self) -> ChunkingOptions {
        ChunkingOptions::Recursive(RecursiveChunkingConfig::new(self.chunk_size, self.chunk_overlap))
    }

    pub fn semantic(&self) -> ChunkingOptions {
        ChunkingOptions::Semantic(
            SemanticChunkingConfig::default()
                .with_percentile(self.semantic_percentile)
                .with_buffer_size(self.semantic_buffer_size)
                .with_min_chunk_size(self.semantic_min_chunk_size),
        )
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: usize,
    pub vector_weight: f32,
    pub text_weight: f32,
    pub distance_function: DistanceFunction,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let weights = HybridWeights::default();
        Self {
            top_k: 10,
            vector_weight: weights.vector_weight,
            text_weight: weights.text_weight,
            distance_function: DistanceFunction::default(),
        }
    }
}

impl SearchConfig {
    pub fn weights(&self) -> HybridWeights {
        HybridWeights::new(self.vector_weight, self.text_weight)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("KNOWLEDGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
