//! Weighted fusion of vector and lexical rankings

use std::collections::HashMap;

use uuid::Uuid;

use super::chunk::Chunk;
use super::search::{ChunkWithScore, HybridWeights, TextQuery, VectorQuery};

/// Both legs of a hybrid search, already oversampled by the caller
#[derive(Debug, Clone)]
pub struct HybridQuery {
    pub vector: VectorQuery,
    pub text: TextQuery,
    pub weights: HybridWeights,
    /// Final number of results
    pub limit: usize,
}

/// Merge two ranked lists by chunk id and score them with `weights`
///
/// A chunk missing from a leg scores 0 there. Candidates whose combined
/// score is not positive are dropped. Ordering is combined score
/// descending; ties keep first-seen order (vector leg first, then
/// text-only hits in text rank order).
pub fn fuse_scores(
    vector_hits: Vec<ChunkWithScore>,
    text_hits: Vec<ChunkWithScore>,
    weights: HybridWeights,
    limit: usize,
) -> Vec<ChunkWithScore> {
    let mut order: Vec<Uuid> = Vec::with_capacity(vector_hits.len() + text_hits.len());
    let mut candidates: HashMap<Uuid, (Chunk, f32, f32)> = HashMap::new();

    for hit in vector_hits {
        let id = hit.chunk.id();
        if !candidates.contains_key(&id) {
            order.push(id);
            candidates.insert(id, (hit.chunk, hit.score, 0.0));
        }
    }

    for hit in text_hits {
        let id = hit.chunk.id();
        match candidates.get_mut(&id) {
            Some(candidate) => candidate.2 = hit.score,
            None => {
                order.push(id);
                candidates.insert(id, (hit.chunk, 0.0, hit.score));
            }
        }
    }

    let mut fused: Vec<ChunkWithScore> = order
        .into_iter()
        .filter_map(|id| candidates.remove(&id))
        .map(|(chunk, vector_score, text_score)| {
            ChunkWithScore::new(chunk, weights.combine(vector_score, text_score))
                .with_leg_scores(vector_score, text_score)
        })
        .filter(|hit| hit.score > 0.0)
        .collect();

    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    fused.truncate(limit);
    fused
}
