//! PostgreSQL + pgvector knowledge store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, QueryBuilder, Row, Transaction};
use uuid::Uuid;

use crate::domain::knowledge_base::{
    Chunk, ChunkDistance, ChunkWithScore, Document, Embedding, KnowledgeBase, KnowledgeBaseConfig,
    KnowledgeBaseId, KnowledgeStore, ParseStatus, SourceType, Tag, TextQuery, VectorQuery,
};
use crate::domain::KnowledgeError;

use super::query::{
    build_full_text_query, build_vector_search_query, embedding_to_pgvector, CHUNK_COLUMNS,
};

/// pgvector-backed knowledge store
///
/// Tables come from `knowledge_migrations`. Vectors travel as text
/// literals cast to `vector`. Cascading deletes run in one transaction,
/// dependents first.
#[derive(Debug, Clone)]
pub struct PgKnowledgeStore {
    pool: PgPool,
}

impl PgKnowledgeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(
        &self,
        operation: &'static str,
    ) -> Result<Transaction<'static, Postgres>, KnowledgeError> {
        self.pool
            .begin()
            .await
            .map_err(|e| KnowledgeError::store(operation, e))
    }

    async fn commit(
        tx: Transaction<'static, Postgres>,
        operation: &'static str,
    ) -> Result<(), KnowledgeError> {
        tx.commit()
            .await
            .map_err(|e| KnowledgeError::store(operation, e))
    }

    /// Run each statement with `id` bound to `$1`
    async fn delete_in_order(
        tx: &mut Transaction<'static, Postgres>,
        operation: &'static str,
        statements: &[&str],
        id: Uuid,
    ) -> Result<u64, KnowledgeError> {
        let mut last = 0;
        for statement in statements {
            last = sqlx::query(statement)
                .bind(id)
                .execute(&mut **tx)
                .await
                .map_err(|e| KnowledgeError::store(operation, e))?
                .rows_affected();
        }
        Ok(last)
    }
}

fn kb_id_from(value: String) -> Result<KnowledgeBaseId, KnowledgeError> {
    Ok(KnowledgeBaseId::new(value)?)
}

fn decode<T>(row: &PgRow, column: &str, operation: &'static str) -> Result<T, KnowledgeError>
where
    T: for<'r> sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| KnowledgeError::store(operation, e))
}

fn knowledge_base_from_row(row: &PgRow) -> Result<KnowledgeBase, KnowledgeError> {
    const OP: &str = "decode_knowledge_base";

    let config = KnowledgeBaseConfig::from_json(decode(row, "config", OP)?)?;
    let status: String = decode(row, "status", OP)?;

    let mut kb = KnowledgeBase::new(kb_id_from(decode(row, "id", OP)?)?, decode::<String>(row, "name", OP)?)
        .with_config(config)
        .with_status(status.parse()?)
        .with_timestamps(decode(row, "created_at", OP)?, decode(row, "updated_at", OP)?);

    if let Some(description) = decode::<Option<String>>(row, "description", OP)? {
        kb = kb.with_description(description);
    }

    Ok(kb)
}

fn document_from_row(row: &PgRow) -> Result<Document, KnowledgeError> {
    const OP: &str = "decode_document";

    let source_type: SourceType = decode::<String>(row, "source_type", OP)?.parse()?;
    let parse_status: ParseStatus = decode::<String>(row, "parse_status", OP)?.parse()?;

    let mut document = Document::new(
        kb_id_from(decode(row, "kb_id", OP)?)?,
        source_type,
        decode::<String>(row, "content_hash", OP)?,
    )
    .with_id(decode(row, "id", OP)?)
    .with_parse_status(parse_status)
    .with_timestamps(decode(row, "created_at", OP)?, decode(row, "updated_at", OP)?);

    if let Some(locator) = decode::<Option<String>>(row, "source_locator", OP)? {
        document = document.with_source_locator(locator);
    }
    if let Some(title) = decode::<Option<String>>(row, "title", OP)? {
        document = document.with_title(title);
    }

    Ok(document)
}

fn chunk_from_row(row: &PgRow) -> Result<Chunk, KnowledgeError> {
    const OP: &str = "decode_chunk";

    let index: i32 = decode(row, "chunk_index", OP)?;

    Ok(Chunk::new(
        kb_id_from(decode(row, "kb_id", OP)?)?,
        decode(row, "document_id", OP)?,
        index.max(0) as usize,
        decode::<String>(row, "content", OP)?,
    )
    .with_id(decode(row, "id", OP)?)
    .with_enabled(decode(row, "enabled", OP)?)
    .with_timestamps(decode(row, "created_at", OP)?, decode(row, "updated_at", OP)?))
}

fn tag_from_row(row: &PgRow) -> Result<Tag, KnowledgeError> {
    const OP: &str = "decode_tag";

    let mut tag = Tag::new(
        kb_id_from(decode(row, "kb_id", OP)?)?,
        decode::<String>(row, "name", OP)?,
    )?
    .with_id(decode(row, "id", OP)?)
    .with_color(decode::<String>(row, "color", OP)?)?
    .with_timestamps(decode(row, "created_at", OP)?, decode(row, "updated_at", OP)?);

    if let Some(description) = decode::<Option<String>>(row, "description", OP)? {
        tag = tag.with_description(description);
    }

    Ok(tag)
}

/// Parse a pgvector text representation back into floats
pub fn parse_pgvector(s: &str) -> Result<Vec<f32>, KnowledgeError> {
    let trimmed = s.trim().trim_start_matches('[').trim_end_matches(']');
    if trimmed.trim().is_empty() {
        return Ok(Vec::new());
    }

    trimmed
        .split(',')
        .map(|v| v.trim().parse::<f32>())
        .collect::<Result<Vec<f32>, _>>()
        .map_err(|e| KnowledgeError::store("decode_embedding", format!("invalid vector: {}", e)))
}

/// Map unique violations to `Conflict` and missing parents to `Validation`
fn write_error(
    operation: &'static str,
    error: sqlx::Error,
    conflict: impl FnOnce() -> String,
) -> KnowledgeError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => KnowledgeError::conflict(conflict()),
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            KnowledgeError::validation(format!("{} references a missing row: {}", operation, db))
        }
        _ => KnowledgeError::store(operation, error),
    }
}

fn insert_error(operation: &'static str, error: sqlx::Error) -> KnowledgeError {
    write_error(operation, error, || format!("{}: duplicate row", operation))
}

/// Bind parameters PostgreSQL accepts in one statement
const MAX_BIND_PARAMS: usize = u16::MAX as usize;

const CHUNK_INSERT_COLUMNS: usize = 9;
const EMBEDDING_INSERT_COLUMNS: usize = 7;

/// Rows of a multi-row insert that fit in one statement
fn rows_per_statement(columns: usize) -> usize {
    (MAX_BIND_PARAMS / columns.max(1)).max(1)
}

const TAG_COLUMNS: &str = "id, kb_id, name, color, description, created_at, updated_at";

#[async_trait]
impl KnowledgeStore for PgKnowledgeStore {
    fn store_type(&self) -> &'static str {
        "pgvector"
    }

    async fn create_knowledge_base(&self, kb: &KnowledgeBase) -> Result<(), KnowledgeError> {
        sqlx::query(
            r#"
            INSERT INTO knowledge_bases (id, name, description, status, config, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(kb.id().as_str())
        .bind(kb.name())
        .bind(kb.description())
        .bind(kb.status().as_str())
        .bind(kb.config().to_json()?)
        .bind(kb.created_at())
        .bind(kb.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            write_error("create_knowledge_base", e, || {
                format!("Knowledge base '{}' already exists", kb.id())
            })
        })?;

        Ok(())
    }

    async fn get_knowledge_base(
        &self,
        id: &KnowledgeBaseId,
    ) -> Result<Option<KnowledgeBase>, KnowledgeError> {
        let row = sqlx::query("SELECT * FROM knowledge_bases WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| KnowledgeError::store("get_knowledge_base", e))?;

        row.as_ref().map(knowledge_base_from_row).transpose()
    }

    async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>, KnowledgeError> {
        let rows = sqlx::query("SELECT * FROM knowledge_bases ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| KnowledgeError::store("list_knowledge_bases", e))?;

        rows.iter().map(knowledge_base_from_row).collect()
    }

    async fn update_knowledge_base(&self, kb: &KnowledgeBase) -> Result<bool, KnowledgeError> {
        let result = sqlx::query(
            r#"
            UPDATE knowledge_bases
            SET name = $2, description = $3, status = $4, config = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(kb.id().as_str())
        .bind(kb.name())
        .bind(kb.description())
        .bind(kb.status().as_str())
        .bind(kb.config().to_json()?)
        .bind(kb.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| KnowledgeError::store("update_knowledge_base", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_knowledge_base(&self, id: &KnowledgeBaseId) -> Result<bool, KnowledgeError> {
        const OP: &str = "delete_knowledge_base";
        let mut tx = self.begin(OP).await?;

        for statement in [
            "DELETE FROM kb_chunk_tags WHERE chunk_id IN (SELECT id FROM kb_chunks WHERE kb_id = $1)",
            "DELETE FROM kb_embeddings WHERE kb_id = $1",
            "DELETE FROM kb_chunks WHERE kb_id = $1",
            "DELETE FROM kb_documents WHERE kb_id = $1",
            "DELETE FROM kb_tags WHERE kb_id = $1",
        ] {
            sqlx::query(statement)
                .bind(id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| KnowledgeError::store(OP, e))?;
        }

        let result = sqlx::query("DELETE FROM knowledge_bases WHERE id = $1")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| KnowledgeError::store(OP, e))?;

        Self::commit(tx, OP).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_document(&self, document: &Document) -> Result<(), KnowledgeError> {
        sqlx::query(
            r#"
            INSERT INTO kb_documents
            (id, kb_id, source_type, source_locator, title, content_hash, parse_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(document.id())
        .bind(document.knowledge_base_id().as_str())
        .bind(document.source_type().as_str())
        .bind(document.source_locator())
        .bind(document.title())
        .bind(document.content_hash())
        .bind(document.parse_status().as_str())
        .bind(document.created_at())
        .bind(document.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error("create_document", e))?;

        Ok(())
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, KnowledgeError> {
        let row = sqlx::query("SELECT * FROM kb_documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| KnowledgeError::store("get_document", e))?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn list_documents(
        &self,
        kb_id: &KnowledgeBaseId,
    ) -> Result<Vec<Document>, KnowledgeError> {
        let rows = sqlx::query("SELECT * FROM kb_documents WHERE kb_id = $1 ORDER BY created_at DESC")
            .bind(kb_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| KnowledgeError::store("list_documents", e))?;

        rows.iter().map(document_from_row).collect()
    }

    async fn update_document_status(
        &self,
        id: Uuid,
        status: ParseStatus,
    ) -> Result<bool, KnowledgeError> {
        let result = sqlx::query(
            "UPDATE kb_documents SET parse_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| KnowledgeError::store("update_document_status", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool, KnowledgeError> {
        const OP: &str = "delete_document";
        let mut tx = self.begin(OP).await?;

        let deleted = Self::delete_in_order(
            &mut tx,
            OP,
            &[
                "DELETE FROM kb_chunk_tags WHERE chunk_id IN (SELECT id FROM kb_chunks WHERE document_id = $1)",
                "DELETE FROM kb_embeddings WHERE chunk_id IN (SELECT id FROM kb_chunks WHERE document_id = $1)",
                "DELETE FROM kb_chunks WHERE document_id = $1",
                "DELETE FROM kb_documents WHERE id = $1",
            ],
            id,
        )
        .await?;

        Self::commit(tx, OP).await?;
        Ok(deleted > 0)
    }

    async fn create_chunks(&self, chunks: &[Chunk]) -> Result<(), KnowledgeError> {
        if chunks.is_empty() {
            return Ok(());
        }

        const OP: &str = "create_chunks";
        let mut tx = self.begin(OP).await?;

        for batch in chunks.chunks(rows_per_statement(CHUNK_INSERT_COLUMNS)) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO kb_chunks \
                 (id, kb_id, document_id, chunk_index, content, content_hash, enabled, created_at, updated_at) ",
            );
            builder.push_values(batch, |mut row, chunk| {
                row.push_bind(chunk.id())
                    .push_bind(chunk.knowledge_base_id().as_str().to_string())
                    .push_bind(chunk.document_id())
                    .push_bind(chunk.chunk_index() as i32)
                    .push_bind(chunk.content().to_string())
                    .push_bind(chunk.content_hash().to_string())
                    .push_bind(chunk.is_enabled())
                    .push_bind(chunk.created_at())
                    .push_bind(chunk.updated_at());
            });

            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| insert_error(OP, e))?;
        }

        Self::commit(tx, OP).await?;

        tracing::debug!(count = chunks.len(), "Inserted chunks");
        Ok(())
    }

    async fn get_chunk(&self, id: Uuid) -> Result<Option<Chunk>, KnowledgeError> {
        let row = sqlx::query(&format!("SELECT {} FROM kb_chunks c WHERE c.id = $1", CHUNK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| KnowledgeError::store("get_chunk", e))?;

        row.as_ref().map(chunk_from_row).transpose()
    }

    async fn list_chunks_by_document(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<Chunk>, KnowledgeError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM kb_chunks c WHERE c.document_id = $1 ORDER BY c.chunk_index",
            CHUNK_COLUMNS
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| KnowledgeError::store("list_chunks_by_document", e))?;

        rows.iter().map(chunk_from_row).collect()
    }

    async fn count_chunks(&self, kb_id: &KnowledgeBaseId) -> Result<usize, KnowledgeError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kb_chunks WHERE kb_id = $1")
            .bind(kb_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| KnowledgeError::store("count_chunks", e))?;

        Ok(count.max(0) as usize)
    }

    async fn set_chunk_enabled(&self, id: Uuid, enabled: bool) -> Result<bool, KnowledgeError> {
        let result =
            sqlx::query("UPDATE kb_chunks SET enabled = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(enabled)
                .execute(&self.pool)
                .await
                .map_err(|e| KnowledgeError::store("set_chunk_enabled", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_chunk(&self, id: Uuid) -> Result<bool, KnowledgeError> {
        const OP: &str = "delete_chunk";
        let mut tx = self.begin(OP).await?;

        let deleted = Self::delete_in_order(
            &mut tx,
            OP,
            &[
                "DELETE FROM kb_chunk_tags WHERE chunk_id = $1",
                "DELETE FROM kb_embeddings WHERE chunk_id = $1",
                "DELETE FROM kb_chunks WHERE id = $1",
            ],
            id,
        )
        .await?;

        Self::commit(tx, OP).await?;
        Ok(deleted > 0)
    }

    async fn upsert_embeddings(&self, embeddings: &[Embedding]) -> Result<(), KnowledgeError> {
        if embeddings.is_empty() {
            return Ok(());
        }

        const OP: &str = "upsert_embeddings";
        let mut tx = self.begin(OP).await?;

        for batch in embeddings.chunks(rows_per_statement(EMBEDDING_INSERT_COLUMNS)) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO kb_embeddings (id, kb_id, chunk_id, embedding, dimension, model, created_at) ",
            );
            builder.push_values(batch, |mut row, embedding| {
                row.push_bind(embedding.id())
                    .push_bind(embedding.knowledge_base_id().as_str().to_string())
                    .push_bind(embedding.chunk_id())
                    .push_bind(embedding_to_pgvector(embedding.vector()))
                    .push_unseparated("::vector")
                    .push_bind(embedding.dimension() as i32)
                    .push_bind(embedding.model().to_string())
                    .push_bind(embedding.created_at());
            });
            builder.push(
                " ON CONFLICT (chunk_id) DO UPDATE SET \
                 embedding = EXCLUDED.embedding, dimension = EXCLUDED.dimension, \
                 model = EXCLUDED.model, created_at = EXCLUDED.created_at",
            );

            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| insert_error(OP, e))?;
        }

        Self::commit(tx, OP).await?;

        tracing::debug!(count = embeddings.len(), "Upserted embeddings");
        Ok(())
    }

    async fn get_embedding_by_chunk(
        &self,
        chunk_id: Uuid,
    ) -> Result<Option<Embedding>, KnowledgeError> {
        const OP: &str = "get_embedding_by_chunk";

        let row = sqlx::query(
            "SELECT id, kb_id, chunk_id, embedding::text AS embedding, model, created_at \
             FROM kb_embeddings WHERE chunk_id = $1",
        )
        .bind(chunk_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| KnowledgeError::store(OP, e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let vector = parse_pgvector(&decode::<String>(&row, "embedding", OP)?)?;
        let created_at: DateTime<Utc> = decode(&row, "created_at", OP)?;

        Ok(Some(
            Embedding::new(
                kb_id_from(decode(&row, "kb_id", OP)?)?,
                decode(&row, "chunk_id", OP)?,
                vector,
                decode::<String>(&row, "model", OP)?,
            )
            .with_id(decode(&row, "id", OP)?)
            .with_created_at(created_at),
        ))
    }

    async fn create_tag(&self, tag: &Tag) -> Result<(), KnowledgeError> {
        sqlx::query(&format!(
            "INSERT INTO kb_tags ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            TAG_COLUMNS
        ))
        .bind(tag.id())
        .bind(tag.knowledge_base_id().as_str())
        .bind(tag.name())
        .bind(tag.color())
        .bind(tag.description())
        .bind(tag.created_at())
        .bind(tag.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            write_error("create_tag", e, || {
                format!(
                    "Tag '{}' already exists in knowledge base '{}'",
                    tag.name(),
                    tag.knowledge_base_id()
                )
            })
        })?;

        Ok(())
    }

    async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>, KnowledgeError> {
        let row = sqlx::query(&format!("SELECT {} FROM kb_tags WHERE id = $1", TAG_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| KnowledgeError::store("get_tag", e))?;

        row.as_ref().map(tag_from_row).transpose()
    }

    async fn list_tags(&self, kb_id: &KnowledgeBaseId) -> Result<Vec<Tag>, KnowledgeError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM kb_tags WHERE kb_id = $1 ORDER BY name",
            TAG_COLUMNS
        ))
        .bind(kb_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| KnowledgeError::store("list_tags", e))?;

        rows.iter().map(tag_from_row).collect()
    }

    async fn update_tag(&self, tag: &Tag) -> Result<bool, KnowledgeError> {
        let result = sqlx::query(
            "UPDATE kb_tags SET name = $2, color = $3, description = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(tag.id())
        .bind(tag.name())
        .bind(tag.color())
        .bind(tag.description())
        .bind(tag.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            write_error("update_tag", e, || {
                format!(
                    "Tag '{}' already exists in knowledge base '{}'",
                    tag.name(),
                    tag.knowledge_base_id()
                )
            })
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_tag(&self, id: Uuid) -> Result<bool, KnowledgeError> {
        const OP: &str = "delete_tag";
        let mut tx = self.begin(OP).await?;

        let deleted = Self::delete_in_order(
            &mut tx,
            OP,
            &[
                "DELETE FROM kb_chunk_tags WHERE tag_id = $1",
                "DELETE FROM kb_tags WHERE id = $1",
            ],
            id,
        )
        .await?;

        Self::commit(tx, OP).await?;
        Ok(deleted > 0)
    }

    async fn add_tag_to_chunk(&self, chunk_id: Uuid, tag_id: Uuid) -> Result<(), KnowledgeError> {
        const OP: &str = "add_tag_to_chunk";

        let chunk_kb: Option<String> = sqlx::query_scalar("SELECT kb_id FROM kb_chunks WHERE id = $1")
            .bind(chunk_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| KnowledgeError::store(OP, e))?;
        let chunk_kb =
            chunk_kb.ok_or_else(|| KnowledgeError::not_found(format!("Chunk {} not found", chunk_id)))?;

        let tag_kb: Option<String> = sqlx::query_scalar("SELECT kb_id FROM kb_tags WHERE id = $1")
            .bind(tag_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| KnowledgeError::store(OP, e))?;
        let tag_kb =
            tag_kb.ok_or_else(|| KnowledgeError::not_found(format!("Tag {} not found", tag_id)))?;

        if chunk_kb != tag_kb {
            return Err(KnowledgeError::validation(
                "Tag and chunk belong to different knowledge bases",
            ));
        }

        sqlx::query(
            "INSERT INTO kb_chunk_tags (chunk_id, tag_id) VALUES ($1, $2) \
             ON CONFLICT (chunk_id, tag_id) DO NOTHING",
        )
        .bind(chunk_id)
        .bind(tag_id)
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(OP, e))?;

        Ok(())
    }

    async fn remove_tag_from_chunk(
        &self,
        chunk_id: Uuid,
        tag_id: Uuid,
    ) -> Result<bool, KnowledgeError> {
        let result = sqlx::query("DELETE FROM kb_chunk_tags WHERE chunk_id = $1 AND tag_id = $2")
            .bind(chunk_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await
            .map_err(|e| KnowledgeError::store("remove_tag_from_chunk", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_tags_for_chunk(&self, chunk_id: Uuid) -> Result<Vec<Tag>, KnowledgeError> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.kb_id, t.name, t.color, t.description, t.created_at, t.updated_at
            FROM kb_tags t
            JOIN kb_chunk_tags ct ON ct.tag_id = t.id
            WHERE ct.chunk_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(chunk_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| KnowledgeError::store("list_tags_for_chunk", e))?;

        rows.iter().map(tag_from_row).collect()
    }

    async fn list_chunks_for_tag(
        &self,
        tag_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Chunk>, KnowledgeError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM kb_chunks c JOIN kb_chunk_tags ct ON ct.chunk_id = c.id \
             WHERE ct.tag_id = $1 ORDER BY c.document_id, c.chunk_index LIMIT $2 OFFSET $3",
            CHUNK_COLUMNS
        ))
        .bind(tag_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| KnowledgeError::store("list_chunks_for_tag", e))?;

        rows.iter().map(chunk_from_row).collect()
    }

    async fn search_by_vector(
        &self,
        query: &VectorQuery,
    ) -> Result<Vec<ChunkDistance>, KnowledgeError> {
        let mut builder = build_vector_search_query(query);

        tracing::debug!(
            distance_function = %query.distance_function,
            limit = query.limit,
            has_predicate = query.predicate.is_some(),
            "Running vector search"
        );

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Vector search failed");
                KnowledgeError::store("search_by_vector", e)
            })?;

        rows.iter()
            .map(|row| {
                Ok(ChunkDistance {
                    chunk: chunk_from_row(row)?,
                    distance: decode(row, "distance", "search_by_vector")?,
                })
            })
            .collect()
    }

    async fn search_by_full_text(
        &self,
        query: &TextQuery,
    ) -> Result<Vec<ChunkWithScore>, KnowledgeError> {
        if query.query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = build_full_text_query(query);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Full-text search failed");
                KnowledgeError::store("search_by_full_text", e)
            })?;

        rows.iter()
            .map(|row| {
                Ok(ChunkWithScore::new(
                    chunk_from_row(row)?,
                    decode(row, "score", "search_by_full_text")?,
                ))
            })
            .collect()
    }

    async fn health_check(&self) -> Result<bool, KnowledgeError> {
        let result = sqlx::query("SELECT 1").execute(&self.pool).await;
        Ok(result.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pgvector() {
        assert_eq!(parse_pgvector("[1,2.5,-3]").unwrap(), vec![1.0, 2.5, -3.0]);
        assert_eq!(parse_pgvector("[]").unwrap(), Vec::<f32>::new());
        assert!(parse_pgvector("[1,abc]").is_err());
    }

    #[test]
    fn test_vector_literal_round_trips_exactly() {
        let vector = vec![
            0.1_f32,
            -0.333_333_34,
            1.0e-7,
            123_456.79,
            f32::MIN_POSITIVE,
            std::f32::consts::PI,
        ];

        let decoded = parse_pgvector(&embedding_to_pgvector(&vector)).unwrap();

        assert_eq!(decoded, vector);
    }

    #[test]
    fn test_batch_inserts_stay_under_bind_limit() {
        let chunk_rows = rows_per_statement(CHUNK_INSERT_COLUMNS);
        let embedding_rows = rows_per_statement(EMBEDDING_INSERT_COLUMNS);

        assert_eq!(chunk_rows, 7281);
        assert!(chunk_rows * CHUNK_INSERT_COLUMNS <= MAX_BIND_PARAMS);
        assert!((chunk_rows + 1) * CHUNK_INSERT_COLUMNS > MAX_BIND_PARAMS);
        assert!(embedding_rows * EMBEDDING_INSERT_COLUMNS <= MAX_BIND_PARAMS);

        let rows = vec![0u8; 7300];
        let batches: Vec<usize> = rows.chunks(chunk_rows).map(<[u8]>::len).collect();
        assert_eq!(batches, vec![7281, 19]);
    }
}
