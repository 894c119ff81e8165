use rayon::prelude::*;
use tracing::warn;

use crate::{
    backend::InferenceBackend,
    error::{Error, Result},
    index::{FileRecord, IndexDb},
};

/// Which stage produced a candidate's score. Scores from different stages are
/// never compared against each other; ordering is always re-established
/// within one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embedding,
    Rerank,
}

/// A transient scored candidate, owned by one query execution.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: String,
    pub score: f32,
    pub stage: Stage,
}

/// Sort candidates by score descending with a lexical-ascending path
/// tie-break, so equal scores always land in the same relative order.
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
}

/// Order the shortlisted records by cosine similarity to the query.
///
/// Obtains one query embedding from the backend (fatal on failure — there is
/// no fallback ordering), scores every shortlisted record in parallel, and
/// returns a deterministic total order. Records without a stored embedding
/// are skipped with a warning; a stored vector of a different dimension than
/// the query vector is a fatal configuration error.
pub fn rank(
    backend: &dyn InferenceBackend,
    query: &str,
    records: &[FileRecord],
    index: &IndexDb,
) -> Result<Vec<Candidate>> {
    let query_vector = backend.embed(query)?;
    if query_vector.is_empty() {
        return Err(Error::InferenceUnavailable(
            "backend returned an empty query embedding".to_string(),
        ));
    }

    let ids: Vec<u64> = records.iter().map(|r| r.embedding_id).collect();
    let loaded = index.batch_load_embeddings(&ids)?;

    let mut scored = Vec::with_capacity(records.len());
    for (record, (_, vector)) in records.iter().zip(loaded) {
        match vector {
            Some(vector) => {
                if vector.len() != query_vector.len() {
                    return Err(Error::DimensionMismatch {
                        expected: vector.len(),
                        actual: query_vector.len(),
                    });
                }
                scored.push((record, vector));
            }
            None => {
                warn!(path = %record.path, "record has no stored embedding, skipping");
            }
        }
    }

    let mut candidates: Vec<Candidate> = scored
        .par_iter()
        .map(|(record, vector)| Candidate {
            path: record.path.clone(),
            score: cosine_similarity(&query_vector, vector),
            stage: Stage::Embedding,
        })
        .collect();

    sort_candidates(&mut candidates);
    Ok(candidates)
}

/// Cosine similarity between two equal-length vectors.
///
/// Returns 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
