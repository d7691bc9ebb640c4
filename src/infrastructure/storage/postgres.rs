//! PostgreSQL connection pooling

use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Executor;

use crate::domain::knowledge_base::validate_identifier;
use crate::domain::KnowledgeError;

/// PostgreSQL connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
    /// Schema holding the knowledge tables; the server default when unset
    pub schema: Option<String>,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/knowledge".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
            schema: None,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// `SET search_path` statement for the configured schema
    ///
    /// The schema name is interpolated, so it must be a plain identifier.
    pub fn search_path_statement(&self) -> Result<Option<String>, KnowledgeError> {
        match &self.schema {
            Some(schema) => {
                validate_identifier(schema)?;
                Ok(Some(format!("SET search_path TO {}, public", schema)))
            }
            None => Ok(None),
        }
    }
}

/// Open a connection pool
pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool, KnowledgeError> {
    let search_path = config.search_path_statement()?;

    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs));

    if let Some(statement) = search_path {
        options = options.after_connect(move |conn, _meta| {
            let statement = statement.clone();
            Box::pin(async move {
                conn.execute(statement.as_str()).await?;
                Ok(())
            })
        });
    }

    let pool = options
        .connect(&config.url)
        .await
        .map_err(|e| KnowledgeError::store("connect", e))?;

    tracing::info!(
        max_connections = config.max_connections,
        schema = config.schema.as_deref().unwrap_or("default"),
        "Connected to PostgreSQL"
    );

    Ok(pool)
}
