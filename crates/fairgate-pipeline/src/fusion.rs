//! Weighted fusion of lexical and semantic retrieval results.

use fairgate_core::ScoredDoc;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Per-request fusion weights.
#[derive(Debug, Clone, Copy)]
pub struct FusionWeights {
    pub bm25: f64,
    pub vector: f64,
}

/// Merges the two result sets: `score = bm25_weight × bm25 + vector_weight
/// × vector`, documents present in both sides sum their weighted scores,
/// then the merged set is filtered by `min_score` and truncated to `top_k`.
/// Ordering is deterministic: score descending, doc id ascending on ties.
pub fn fuse(
    bm25: Vec<ScoredDoc>,
    vector: Vec<ScoredDoc>,
    weights: FusionWeights,
    min_score: f64,
    top_k: usize,
) -> Vec<ScoredDoc> {
    let mut merged: HashMap<String, ScoredDoc> = HashMap::new();

    for mut doc in bm25 {
        doc.score *= weights.bm25;
        merged.insert(doc.doc_id.clone(), doc);
    }

    for mut doc in vector {
        doc.score *= weights.vector;
        match merged.get_mut(&doc.doc_id) {
            Some(existing) => existing.score += doc.score,
            None => {
                merged.insert(doc.doc_id.clone(), doc);
            }
        }
    }

    let mut docs: Vec<ScoredDoc> = merged.into_values().collect();
    docs.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    docs.retain(|doc| doc.score >= min_score);
    docs.truncate(top_k);
    docs
}
