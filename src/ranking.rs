use crate::document::DocumentStore;
use crate::index::FrequencyIndex;
use crate::vector::{vectorize_counts, TermVector};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Ranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub score: f64,
}

/// Cosine similarity, 0 when either side has zero magnitude.
pub fn cosine_similarity(a: &TermVector, b: &TermVector) -> f64 {
    let magnitude = a.norm() * b.norm();
    if magnitude == 0.0 {
        return 0.0;
    }
    let score = a.dot(b) / magnitude;
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(-1.0, 1.0)
}

/// Descending score, ties broken by ascending document index.
fn by_score_then_index(a: &ScoredDocument, b: &ScoredDocument) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.index.cmp(&b.index))
}

/// Score every document against `query`.
///
/// Document vectors are rebuilt from raw counts with the index's current IDF
/// values on every call, since IDF moves as the corpus grows.
pub fn rank(
    query: &TermVector,
    store: &DocumentStore,
    index: &mut FrequencyIndex,
) -> Vec<ScoredDocument> {
    let mut scored: Vec<ScoredDocument> = store
        .iter()
        .map(|doc| {
            let doc_vector = vectorize_counts(&doc.term_counts, index);
            ScoredDocument {
                index: doc.index,
                key: doc.key.clone(),
                score: cosine_similarity(query, &doc_vector),
            }
        })
        .collect();

    scored.sort_by(by_score_then_index);
    scored
}

/// Ordinals of the first `k` ranked documents.
pub fn top_k(ranked: &[ScoredDocument], k: usize) -> Vec<usize> {
    ranked.iter().take(k).map(|sd| sd.index).collect()
}
