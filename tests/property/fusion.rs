//! Properties of hybrid score fusion.
//!
//! Invariants tested:
//! - Fused output never exceeds `top_k` and never contains a score below
//!   `min_score`
//! - Document ids are unique after fusion
//! - Documents present in both sides carry the weighted sum of scores

use fairgate_core::{ScoredDoc, TenantId};
use fairgate_pipeline::{fuse, FusionWeights};
use proptest::prelude::*;
use std::collections::HashSet;

fn docs(scores: &[(u8, f64)]) -> Vec<ScoredDoc> {
    let mut seen = HashSet::new();
    scores
        .iter()
        .filter(|(id, _)| seen.insert(*id))
        .map(|(id, score)| ScoredDoc {
            doc_id: format!("doc-{id}"),
            content: format!("content {id}"),
            score: *score,
            tenant_id: TenantId::from("prop-tenant"),
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn fusion_respects_min_score_and_top_k(
        bm25 in prop::collection::vec((0u8..20, 0.0f64..1.0), 0..12),
        vector in prop::collection::vec((0u8..20, 0.0f64..1.0), 0..12),
        bm25_weight in 0.0f64..1.0,
        vector_weight in 0.0f64..1.0,
        min_score in 0.0f64..0.8,
        top_k in 1usize..8,
    ) {
        let fused = fuse(
            docs(&bm25),
            docs(&vector),
            FusionWeights { bm25: bm25_weight, vector: vector_weight },
            min_score,
            top_k,
        );

        prop_assert!(fused.len() <= top_k);
        let mut ids = HashSet::new();
        for doc in &fused {
            prop_assert!(doc.score >= min_score);
            prop_assert!(ids.insert(doc.doc_id.clone()), "duplicate doc id after fusion");
        }

        // Descending score order.
        for pair in fused.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn shared_documents_sum_their_weighted_scores(
        score_a in 0.1f64..1.0,
        score_b in 0.1f64..1.0,
        bm25_weight in 0.1f64..1.0,
        vector_weight in 0.1f64..1.0,
    ) {
        let bm25 = docs(&[(1, score_a)]);
        let vector = docs(&[(1, score_b)]);
        let fused = fuse(
            bm25,
            vector,
            FusionWeights { bm25: bm25_weight, vector: vector_weight },
            0.0,
            10,
        );

        prop_assert_eq!(fused.len(), 1);
        let expected = score_a * bm25_weight + score_b * vector_weight;
        prop_assert!((fused[0].score - expected).abs() < 1e-9);
    }
}
