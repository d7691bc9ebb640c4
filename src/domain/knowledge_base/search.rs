//! Search query and result types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chunk::Chunk;
use super::entity::KnowledgeBaseId;
use super::predicate::SafePredicate;
use crate::domain::KnowledgeError;

/// Default weight of the vector leg in hybrid search
pub const DEFAULT_VECTOR_WEIGHT: f32 = 0.7;

/// Default weight of the full-text leg in hybrid search
pub const DEFAULT_TEXT_WEIGHT: f32 = 0.3;

/// Distance function for vector similarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DistanceFunction {
    /// Cosine distance (1 - cosine similarity)
    #[default]
    Cosine,
    /// Euclidean (L2) distance
    L2,
    /// Negative inner product, as pgvector reports it
    InnerProduct,
}

impl DistanceFunction {
    /// pgvector operator for this function
    pub fn operator(&self) -> &'static str {
        match self {
            Self::Cosine => "<=>",
            Self::L2 => "<->",
            Self::InnerProduct => "<#>",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
            Self::InnerProduct => "inner_product",
        }
    }

    /// Translate a score threshold into distance space
    ///
    /// Cosine inverts the score; l2 and inner product use it unchanged.
    pub fn distance_threshold(&self, score: f32) -> f64 {
        match self {
            Self::Cosine => 1.0 - score as f64,
            Self::L2 | Self::InnerProduct => score as f64,
        }
    }

    /// Convert a raw distance into a higher-is-better score in [0, 1]
    ///
    /// Inner product distances are negative for aligned vectors, so they go
    /// through the logistic `1 / (1 + e^d)`, which is strictly decreasing
    /// over the whole real line.
    pub fn score(&self, distance: f64) -> f32 {
        let score = match self {
            Self::Cosine => 1.0 - distance,
            Self::L2 => 1.0 / (1.0 + distance.max(0.0)),
            Self::InnerProduct => 1.0 / (1.0 + distance.exp()),
        };

        score.clamp(0.0, 1.0) as f32
    }
}

impl FromStr for DistanceFunction {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cosine" => Ok(Self::Cosine),
            "l2" => Ok(Self::L2),
            "inner_product" | "innerProduct" => Ok(Self::InnerProduct),
            other => Err(KnowledgeError::InvalidDistanceFunction(other.to_string())),
        }
    }
}

impl TryFrom<String> for DistanceFunction {
    type Error = KnowledgeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DistanceFunction> for String {
    fn from(value: DistanceFunction) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DistanceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which chunks a search may return
///
/// Empty lists mean "no restriction". Tag ids match when a chunk carries any of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchScope {
    pub knowledge_base_ids: Vec<KnowledgeBaseId>,
    pub tag_ids: Vec<Uuid>,
}

impl SearchScope {
    pub fn knowledge_base(id: KnowledgeBaseId) -> Self {
        Self {
            knowledge_base_ids: vec![id],
            tag_ids: Vec::new(),
        }
    }

    pub fn with_knowledge_bases(mut self, ids: Vec<KnowledgeBaseId>) -> Self {
        self.knowledge_base_ids = ids;
        self
    }

    pub fn with_tags(mut self, tag_ids: Vec<Uuid>) -> Self {
        self.tag_ids = tag_ids;
        self
    }
}

/// Caller-facing options of a vector search
#[derive(Debug, Clone, Default)]
pub struct VectorSearchOptions {
    pub distance_function: DistanceFunction,
    /// Minimum score, in the same space as returned scores
    pub score_threshold: Option<f32>,
    /// Extra filter expression over the chunk (`c`) and embedding (`e`) rows
    pub extra_predicate: Option<String>,
}

impl VectorSearchOptions {
    pub fn with_distance_function(mut self, distance_function: DistanceFunction) -> Self {
        self.distance_function = distance_function;
        self
    }

    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    pub fn with_extra_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.extra_predicate = Some(predicate.into());
        self
    }
}

/// Validated vector query handed to a store
#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub scope: SearchScope,
    pub vector: Vec<f32>,
    pub limit: usize,
    pub distance_function: DistanceFunction,
    /// Only rows with a distance strictly below this value
    pub max_distance: Option<f64>,
    pub predicate: Option<SafePredicate>,
}

/// Lexical query handed to a store
#[derive(Debug, Clone)]
pub struct TextQuery {
    pub scope: SearchScope,
    pub query: String,
    pub limit: usize,
}

/// Raw vector search row
#[derive(Debug, Clone)]
pub struct ChunkDistance {
    pub chunk: Chunk,
    pub distance: f64,
}

/// A ranked chunk
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkWithScore {
    pub chunk: Chunk,
    /// Higher is more relevant
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_score: Option<f32>,
}

impl ChunkWithScore {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self {
            chunk,
            score,
            vector_score: None,
            text_score: None,
        }
    }

    pub fn with_leg_scores(mut self, vector_score: f32, text_score: f32) -> Self {
        self.vector_score = Some(vector_score);
        self.text_score = Some(text_score);
        self
    }
}

/// Weights of a hybrid search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub vector_weight: f32,
    pub text_weight: f32,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            vector_weight: DEFAULT_VECTOR_WEIGHT,
            text_weight: DEFAULT_TEXT_WEIGHT,
        }
    }
}

impl HybridWeights {
    pub fn new(vector_weight: f32, text_weight: f32) -> Self {
        Self {
            vector_weight,
            text_weight,
        }
    }

    pub fn combine(&self, vector_score: f32, text_score: f32) -> f32 {
        self.vector_weight * vector_score + self.text_weight * text_score
    }
}

/// Outward search response
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub chunks: Vec<ChunkWithScore>,
    pub total_count: usize,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_chunks(chunks: Vec<ChunkWithScore>) -> Self {
        let total_count = chunks.len();
        Self {
            chunks,
            total_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_function_operators() {
        assert_eq!(DistanceFunction::Cosine.operator(), "<=>");
        assert_eq!(DistanceFunction::L2.operator(), "<->");
        assert_eq!(DistanceFunction::InnerProduct.operator(), "<#>");
    }

    #[test]
    fn test_parse_distance_function() {
        assert_eq!("cosine".parse::<DistanceFunction>().unwrap(), DistanceFunction::Cosine);
        assert_eq!(
            "innerProduct".parse::<DistanceFunction>().unwrap(),
            DistanceFunction::InnerProduct
        );
        assert!(matches!(
            "manhattan".parse::<DistanceFunction>(),
            Err(KnowledgeError::InvalidDistanceFunction(name)) if name == "manhattan"
        ));
    }

    #[test]
    fn test_distance_function_deserialization_is_closed() {
        let ok: DistanceFunction = serde_json::from_str("\"l2\"").unwrap();
        assert_eq!(ok, DistanceFunction::L2);

        let bad: Result<DistanceFunction, _> = serde_json::from_str("\"hamming\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_threshold_conversion() {
        assert!((DistanceFunction::Cosine.distance_threshold(0.8) - 0.2).abs() < 1e-6);
        assert!((DistanceFunction::L2.distance_threshold(0.8) - 0.8).abs() < 1e-6);
        assert!((DistanceFunction::InnerProduct.distance_threshold(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_scores_are_higher_is_better_and_bounded() {
        for function in [
            DistanceFunction::Cosine,
            DistanceFunction::L2,
            DistanceFunction::InnerProduct,
        ] {
            let near = function.score(0.1);
            let far = function.score(0.9);

            assert!(near > far, "{}", function);
            assert!(near > 0.0 && near <= 1.0);
        }

        assert!((DistanceFunction::Cosine.score(0.0) - 1.0).abs() < 1e-6);
        assert!((DistanceFunction::L2.score(0.0) - 1.0).abs() < 1e-6);
        assert!((DistanceFunction::L2.score(1.0) - 0.5).abs() < 1e-6);
        assert!((DistanceFunction::Cosine.score(0.25) - 0.75).abs() < 1e-6);
        assert!((DistanceFunction::InnerProduct.score(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_inner_product_scores_keep_ranking_for_aligned_vectors() {
        // pgvector `<#>` distances for inner products 0.95, 0.5, 0.05 and -0.3
        let distances = [-0.95, -0.5, -0.05, 0.3];
        let scores: Vec<f32> = distances
            .iter()
            .map(|d| DistanceFunction::InnerProduct.score(*d))
            .collect();

        for pair in scores.windows(2) {
            assert!(pair[0] > pair[1], "{:?}", scores);
        }
        assert!(scores.iter().all(|s| *s > 0.0 && *s < 1.0));
    }

    #[test]
    fn test_hybrid_weights_combine() {
        let weights = HybridWeights::default();
        assert!((weights.combine(1.0, 0.0) - 0.7).abs() < 1e-6);
        assert!((weights.combine(0.0, 1.0) - 0.3).abs() < 1e-6);
        assert!((weights.combine(0.5, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_search_response_serializes_camel_case() {
        let value = serde_json::to_value(SearchResponse::empty()).unwrap();
        assert_eq!(value, serde_json::json!({"chunks": [], "totalCount": 0}));
    }
}
