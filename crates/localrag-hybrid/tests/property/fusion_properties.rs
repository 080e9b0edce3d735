use localrag_core::types::{ScoredCandidate, SearchHit, SourceKind};
use localrag_hybrid::{reciprocal_rank_fusion, DEFAULT_RRF_K};
use proptest::prelude::*;

fn ranked(ids: &[u8], source: SourceKind) -> Vec<ScoredCandidate> {
    let hits: Vec<SearchHit> = ids.iter().map(|i| SearchHit { id: format!("c{i:03}"), score: 0.0, source }).collect();
    ScoredCandidate::rank_hits(&hits, source)
}

proptest! {
    #[test]
    fn fusion_is_deterministic(v in prop::collection::vec(0u8..40, 0..20), l in prop::collection::vec(0u8..40, 0..20), k in 1u32..200) {
        let lists = [ranked(&v, SourceKind::Vector), ranked(&l, SourceKind::Lexical)];
        let first = reciprocal_rank_fusion(&lists, k);
        let second = reciprocal_rank_fusion(&lists, k);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn list_order_does_not_matter(v in prop::collection::vec(0u8..40, 0..20), l in prop::collection::vec(0u8..40, 0..20)) {
        let vector = ranked(&v, SourceKind::Vector);
        let lexical = ranked(&l, SourceKind::Lexical);
        let a: Vec<String> = reciprocal_rank_fusion(&[vector.clone(), lexical.clone()], DEFAULT_RRF_K).into_iter().map(|f| f.id).collect();
        let b: Vec<String> = reciprocal_rank_fusion(&[lexical, vector], DEFAULT_RRF_K).into_iter().map(|f| f.id).collect();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn first_in_both_outranks_first_in_one(
        v_tail in prop::collection::vec(1u8..40, 0..15),
        l_tail in prop::collection::vec(1u8..40, 0..15),
        k in 1u32..200,
    ) {
        // c000 leads both lists; every other chunk can lead at most one.
        let mut v = vec![0u8];
        v.extend(v_tail);
        let mut l = vec![0u8];
        l.extend(l_tail);
        let fused = reciprocal_rank_fusion(&[ranked(&v, SourceKind::Vector), ranked(&l, SourceKind::Lexical)], k);
        prop_assert_eq!(fused[0].id.as_str(), "c000");
        if fused.len() > 1 {
            prop_assert!(fused[0].score > fused[1].score);
        }
    }

    #[test]
    fn output_is_the_union_sorted_descending(v in prop::collection::vec(0u8..40, 0..20), l in prop::collection::vec(0u8..40, 0..20)) {
        let fused = reciprocal_rank_fusion(&[ranked(&v, SourceKind::Vector), ranked(&l, SourceKind::Lexical)], DEFAULT_RRF_K);
        let mut expected: Vec<u8> = v.iter().chain(l.iter()).copied().collect();
        expected.sort_unstable();
        expected.dedup();
        prop_assert_eq!(fused.len(), expected.len());
        for pair in fused.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }
}
