//! Runtime selection of the knowledge store backend

use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use crate::domain::knowledge_base::KnowledgeStore;
use crate::domain::KnowledgeError;
use crate::infrastructure::knowledge_base::{InMemoryKnowledgeStore, PgKnowledgeStore};

use super::postgres::{connect_pool, PostgresConfig};

/// Supported storage backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    Memory,
    /// PostgreSQL with pgvector
    #[default]
    Postgres,
}

impl FromStr for StorageType {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Ok(Self::Memory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(KnowledgeError::validation(format!(
                "Unknown storage type '{}'",
                other
            ))),
        }
    }
}

/// Factory for knowledge store instances
#[derive(Debug)]
pub struct StoreFactory;

impl StoreFactory {
    /// Create a store for `storage_type`, connecting to PostgreSQL when needed
    pub async fn create(
        storage_type: StorageType,
        database: &PostgresConfig,
    ) -> Result<Arc<dyn KnowledgeStore>, KnowledgeError> {
        match storage_type {
            StorageType::Memory => {
                tracing::info!("Using in-memory knowledge store");
                Ok(Arc::new(InMemoryKnowledgeStore::new()))
            }
            StorageType::Postgres => {
                let pool = connect_pool(database).await?;
                Ok(Arc::new(PgKnowledgeStore::new(pool)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_from_str() {
        assert_eq!("memory".parse::<StorageType>().unwrap(), StorageType::Memory);
        assert_eq!("In-Memory".parse::<StorageType>().unwrap(), StorageType::Memory);
        assert_eq!("pg".parse::<StorageType>().unwrap(), StorageType::Postgres);
        assert!("sqlite".parse::<StorageType>().is_err());
    }

    #[tokio::test]
    async fn test_memory_store_needs_no_database() {
        let store = StoreFactory::create(StorageType::Memory, &PostgresConfig::default())
            .await
            .unwrap();

        assert_eq!(store.store_type(), "in_memory");
        assert!(store.health_check().await.unwrap());
    }
}
