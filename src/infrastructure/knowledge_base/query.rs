//! SQL assembly for the search primitives
//!
//! Every value goes through `push_bind`; only the distance operator (from a
//! closed enum) and a predicate that passed the keyword denylist are
//! appended as SQL text.

use sqlx::{Postgres, QueryBuilder};

use crate::domain::knowledge_base::{SearchScope, TextQuery, VectorQuery};

/// Chunk columns selected by every chunk query, aliased `c`
pub const CHUNK_COLUMNS: &str = "c.id, c.kb_id, c.document_id, c.chunk_index, c.content, \
     c.content_hash, c.enabled, c.created_at, c.updated_at";

/// pgvector text literal, e.g. `[0.1,0.2]`
///
/// `f32` formatting is shortest round-trip, so parsing it back yields the
/// same floats.
pub fn embedding_to_pgvector(vector: &[f32]) -> String {
    let values: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(","))
}

/// Append the knowledge base and tag restrictions of `scope`
fn push_scope(builder: &mut QueryBuilder<'static, Postgres>, scope: &SearchScope) {
    if !scope.knowledge_base_ids.is_empty() {
        let ids: Vec<String> = scope
            .knowledge_base_ids
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();
        builder.push(" AND c.kb_id = ANY(");
        builder.push_bind(ids);
        builder.push(")");
    }

    if !scope.tag_ids.is_empty() {
        builder.push(
            " AND EXISTS (SELECT 1 FROM kb_chunk_tags ct WHERE ct.chunk_id = c.id AND ct.tag_id = ANY(",
        );
        builder.push_bind(scope.tag_ids.clone());
        builder.push("))");
    }
}

/// Vector search over enabled, embedded chunks ordered by raw distance
pub fn build_vector_search_query(query: &VectorQuery) -> QueryBuilder<'static, Postgres> {
    let operator = query.distance_function.operator();
    let literal = embedding_to_pgvector(&query.vector);

    let mut builder = QueryBuilder::new("SELECT ");
    builder.push(CHUNK_COLUMNS);
    builder.push(format!(", (e.embedding {} ", operator));
    builder.push_bind(literal.clone());
    builder.push(
        "::vector)::float8 AS distance FROM kb_chunks c \
         JOIN kb_embeddings e ON e.chunk_id = c.id \
         WHERE c.enabled = TRUE",
    );

    push_scope(&mut builder, &query.scope);

    if let Some(max_distance) = query.max_distance {
        builder.push(format!(" AND (e.embedding {} ", operator));
        builder.push_bind(literal);
        builder.push("::vector) < ");
        builder.push_bind(max_distance);
    }

    if let Some(predicate) = &query.predicate {
        builder.push(" AND (");
        builder.push(predicate.as_str());
        builder.push(")");
    }

    builder.push(" ORDER BY distance ASC LIMIT ");
    builder.push_bind(query.limit as i64);
    builder
}

/// Lexical search ranked by `ts_rank_cd` with normalisation 32 (`rank / (rank + 1)`)
pub fn build_full_text_query(query: &TextQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT ");
    builder.push(CHUNK_COLUMNS);
    builder.push(
        ", ts_rank_cd(c.content_tsv, q.query, 32)::float4 AS score \
         FROM kb_chunks c, plainto_tsquery('simple', ",
    );
    builder.push_bind(query.query.clone());
    builder.push(") AS q(query) WHERE c.enabled = TRUE AND c.content_tsv @@ q.query");

    push_scope(&mut builder, &query.scope);

    builder.push(" ORDER BY score DESC, c.created_at ASC, c.chunk_index ASC LIMIT ");
    builder.push_bind(query.limit as i64);
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::knowledge_base::{DistanceFunction, KnowledgeBaseId, SafePredicate};
    use uuid::Uuid;

    fn vector_query(distance_function: DistanceFunction) -> VectorQuery {
        VectorQuery {
            scope: SearchScope::knowledge_base(KnowledgeBaseId::new("kb").unwrap()),
            vector: vec![0.5, -1.25],
            limit: 5,
            distance_function,
            max_distance: None,
            predicate: None,
        }
    }

    #[test]
    fn test_embedding_literal() {
        assert_eq!(embedding_to_pgvector(&[0.1, -2.0, 3.5]), "[0.1,-2,3.5]");
        assert_eq!(embedding_to_pgvector(&[]), "[]");
    }

    #[test]
    fn test_vector_query_minimal() {
        let builder = build_vector_search_query(&vector_query(DistanceFunction::Cosine));
        let sql = builder.sql();

        assert!(sql.contains("(e.embedding <=> $1::vector)::float8 AS distance"));
        assert!(sql.contains("JOIN kb_embeddings e ON e.chunk_id = c.id"));
        assert!(sql.contains("WHERE c.enabled = TRUE AND c.kb_id = ANY($2)"));
        assert!(sql.ends_with("ORDER BY distance ASC LIMIT $3"));
    }

    #[test]
    fn test_vector_query_operator_per_function() {
        let l2 = build_vector_search_query(&vector_query(DistanceFunction::L2));
        assert!(l2.sql().contains("e.embedding <-> $1"));

        let ip = build_vector_search_query(&vector_query(DistanceFunction::InnerProduct));
        assert!(ip.sql().contains("e.embedding <#> $1"));
    }

    #[test]
    fn test_vector_query_threshold_tags_and_predicate() {
        let mut query = vector_query(DistanceFunction::Cosine);
        query.scope = query.scope.with_tags(vec![Uuid::new_v4()]);
        query.max_distance = Some(0.25);
        query.predicate = SafePredicate::parse("c.chunk_index < 10").unwrap();

        let builder = build_vector_search_query(&query);
        let sql = builder.sql();

        assert!(sql.contains("ct.tag_id = ANY($3)"));
        assert!(sql.contains("AND (e.embedding <=> $4::vector) < $5"));
        assert!(sql.contains("AND (c.chunk_index < 10)"));
        assert!(sql.ends_with("LIMIT $6"));
    }

    #[test]
    fn test_vector_query_without_scope() {
        let mut query = vector_query(DistanceFunction::Cosine);
        query.scope = SearchScope::default();

        let builder = build_vector_search_query(&query);

        assert!(!builder.sql().contains("ANY("));
        assert!(builder.sql().ends_with("LIMIT $2"));
    }

    #[test]
    fn test_full_text_query() {
        let query = TextQuery {
            scope: SearchScope::knowledge_base(KnowledgeBaseId::new("kb").unwrap()),
            query: "'; DROP TABLE kb_chunks; --".to_string(),
            limit: 3,
        };

        let builder = build_full_text_query(&query);
        let sql = builder.sql();

        assert!(sql.contains("ts_rank_cd(c.content_tsv, q.query, 32)"));
        assert!(sql.contains("plainto_tsquery('simple', $1)"));
        assert!(sql.contains("c.content_tsv @@ q.query AND c.kb_id = ANY($2)"));
        assert!(!sql.contains("DROP"));
        assert!(sql.ends_with("LIMIT $3"));
    }
}
