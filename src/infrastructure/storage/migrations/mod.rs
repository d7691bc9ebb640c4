//! Versioned schema of the knowledge store
//!
//! Applied versions are recorded in `_migrations`. Each migration and its
//! bookkeeping row commit in the same transaction.

use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};

use crate::domain::KnowledgeError;

const OP: &str = "migrate";

/// One schema step with its inverse
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    pub up: String,
    pub down: String,
}

impl Migration {
    pub fn new(
        version: i64,
        description: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        Self {
            version,
            description: description.into(),
            up: up.into(),
            down: down.into(),
        }
    }
}

/// Schema of the knowledge store, in apply order
///
/// Foreign keys carry no `ON DELETE CASCADE`; the store deletes dependent
/// rows itself.
pub fn knowledge_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "Create knowledge_bases table",
            r#"
            CREATE EXTENSION IF NOT EXISTS vector;
            CREATE TABLE IF NOT EXISTS knowledge_bases (
                id VARCHAR(50) PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                status VARCHAR(16) NOT NULL DEFAULT 'active',
                config JSONB NOT NULL DEFAULT '{}',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
            r#"
            DROP TABLE IF EXISTS knowledge_bases;
            "#,
        ),
        Migration::new(
            2,
            "Create kb_documents table",
            r#"
            CREATE TABLE IF NOT EXISTS kb_documents (
                id UUID PRIMARY KEY,
                kb_id VARCHAR(50) NOT NULL REFERENCES knowledge_bases(id),
                source_type VARCHAR(16) NOT NULL,
                source_locator TEXT,
                title TEXT,
                content_hash VARCHAR(64) NOT NULL,
                parse_status VARCHAR(16) NOT NULL DEFAULT 'pending',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_kb_documents_kb_id ON kb_documents(kb_id, created_at DESC);
            "#,
            r#"
            DROP TABLE IF EXISTS kb_documents;
            "#,
        ),
        Migration::new(
            3,
            "Create kb_chunks table",
            r#"
            CREATE TABLE IF NOT EXISTS kb_chunks (
                id UUID PRIMARY KEY,
                kb_id VARCHAR(50) NOT NULL REFERENCES knowledge_bases(id),
                document_id UUID NOT NULL REFERENCES kb_documents(id),
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                content_hash VARCHAR(64) NOT NULL,
                enabled BOOLEAN NOT NULL DEFAULT TRUE,
                content_tsv TSVECTOR GENERATED ALWAYS AS (to_tsvector('simple', content)) STORED,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (document_id, chunk_index)
            );
            CREATE INDEX IF NOT EXISTS idx_kb_chunks_kb_id ON kb_chunks(kb_id);
            CREATE INDEX IF NOT EXISTS idx_kb_chunks_tsv ON kb_chunks USING GIN(content_tsv);
            "#,
            r#"
            DROP TABLE IF EXISTS kb_chunks;
            "#,
        ),
        Migration::new(
            4,
            "Create kb_embeddings table",
            r#"
            CREATE TABLE IF NOT EXISTS kb_embeddings (
                id UUID PRIMARY KEY,
                kb_id VARCHAR(50) NOT NULL REFERENCES knowledge_bases(id),
                chunk_id UUID NOT NULL UNIQUE REFERENCES kb_chunks(id),
                embedding VECTOR NOT NULL,
                dimension INTEGER NOT NULL,
                model TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_kb_embeddings_kb_id ON kb_embeddings(kb_id);
            "#,
            r#"
            DROP TABLE IF EXISTS kb_embeddings;
            "#,
        ),
        Migration::new(
            5,
            "Create kb_tags and kb_chunk_tags tables",
            r#"
            CREATE TABLE IF NOT EXISTS kb_tags (
                id UUID PRIMARY KEY,
                kb_id VARCHAR(50) NOT NULL REFERENCES knowledge_bases(id),
                name VARCHAR(64) NOT NULL,
                color VARCHAR(7) NOT NULL,
                description TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (kb_id, name)
            );
            CREATE TABLE IF NOT EXISTS kb_chunk_tags (
                chunk_id UUID NOT NULL REFERENCES kb_chunks(id),
                tag_id UUID NOT NULL REFERENCES kb_tags(id),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (chunk_id, tag_id)
            );
            CREATE INDEX IF NOT EXISTS idx_kb_chunk_tags_tag_id ON kb_chunk_tags(tag_id);
            "#,
            r#"
            DROP TABLE IF EXISTS kb_chunk_tags;
            DROP TABLE IF EXISTS kb_tags;
            "#,
        ),
    ]
}

/// Migrations newer than `applied`, in apply order
pub fn pending(migrations: &[Migration], applied: Option<i64>) -> &[Migration] {
    let start = applied.map_or(0, |version| {
        migrations.partition_point(|m| m.version <= version)
    });
    &migrations[start..]
}

/// Applies and reverts `knowledge_migrations` against a pool
#[derive(Debug)]
pub struct PostgresMigrator {
    pool: PgPool,
    migrations: Vec<Migration>,
}

impl PostgresMigrator {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            migrations: knowledge_migrations(),
        }
    }

    /// Apply every pending migration; returns how many ran
    pub async fn run(&self) -> Result<usize, KnowledgeError> {
        let current = self.version().await?;
        let pending = pending(&self.migrations, current);

        for migration in pending {
            tracing::info!(
                version = migration.version,
                description = %migration.description,
                "Applying migration"
            );

            let mut tx = self.begin().await?;
            execute_script(&mut tx, &migration.up, migration.version).await?;
            sqlx::query("INSERT INTO _migrations (version, description) VALUES ($1, $2)")
                .bind(migration.version)
                .bind(&migration.description)
                .execute(&mut *tx)
                .await
                .map_err(|e| KnowledgeError::store(OP, e))?;
            tx.commit().await.map_err(|e| KnowledgeError::store(OP, e))?;
        }

        Ok(pending.len())
    }

    /// Revert the latest applied migration; returns its version
    pub async fn revert(&self) -> Result<Option<i64>, KnowledgeError> {
        let Some(version) = self.version().await? else {
            return Ok(None);
        };

        let migration = self
            .migrations
            .iter()
            .find(|m| m.version == version)
            .ok_or_else(|| {
                KnowledgeError::store(OP, format!("unknown migration version {}", version))
            })?;

        tracing::info!(version, description = %migration.description, "Reverting migration");

        let mut tx = self.begin().await?;
        execute_script(&mut tx, &migration.down, version).await?;
        sqlx::query("DELETE FROM _migrations WHERE version = $1")
            .bind(version)
            .execute(&mut *tx)
            .await
            .map_err(|e| KnowledgeError::store(OP, e))?;
        tx.commit().await.map_err(|e| KnowledgeError::store(OP, e))?;

        Ok(Some(version))
    }

    /// Latest applied version, `None` on an empty database
    pub async fn version(&self) -> Result<Option<i64>, KnowledgeError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _migrations (\
             version BIGINT PRIMARY KEY, \
             description TEXT NOT NULL, \
             installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW())",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| KnowledgeError::store(OP, e))?;

        sqlx::query_scalar("SELECT MAX(version) FROM _migrations")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| KnowledgeError::store(OP, e))
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, KnowledgeError> {
        self.pool.begin().await.map_err(|e| KnowledgeError::store(OP, e))
    }
}

/// Multi-statement scripts need the simple query protocol
async fn execute_script(
    tx: &mut Transaction<'static, Postgres>,
    script: &str,
    version: i64,
) -> Result<(), KnowledgeError> {
    sqlx::raw_sql(script)
        .execute(&mut **tx)
        .await
        .map_err(|e| KnowledgeError::store(OP, format!("migration {}: {}", version, e)))?;
    Ok(())
}
