//! Reciprocal Rank Fusion.
//!
//! `score(d) = Σ_lists 1 / (k + rank_list(d))` with 1-based ranks; a chunk
//! absent from a list contributes nothing for that list. Only rank positions
//! enter the score, so BM25 and cosine scales never have to be reconciled.

use std::cmp::Ordering;
use std::collections::HashMap;

use localrag_core::types::{ChunkId, Provenance, ScoredCandidate};

/// Smoothing constant from Cormack, Clarke and Buettcher (SIGIR 2009).
pub const DEFAULT_RRF_K: u32 = 60;

/// A chunk id with its fused score, before the chunk itself is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub id: ChunkId,
    pub score: f64,
    pub provenance: Provenance,
}

/// Fuse ranked lists into one ordering.
///
/// Sorted by fused score descending, then by the best rank achieved in any
/// list, then by chunk id, so the output is a pure function of the inputs.
pub fn reciprocal_rank_fusion(lists: &[Vec<ScoredCandidate>], k_rrf: u32) -> Vec<FusedCandidate> {
    let k = f64::from(k_rrf);
    let mut by_id: HashMap<&str, FusedCandidate> = HashMap::new();
    for list in lists {
        for cand in list {
            let entry = by_id.entry(cand.id.as_str()).or_insert_with(|| FusedCandidate {
                id: cand.id.clone(),
                score: 0.0,
                provenance: Provenance::default(),
            });
            entry.score += 1.0 / (k + cand.rank as f64);
            entry.provenance.record(cand.source, cand.rank);
        }
    }
    let mut fused: Vec<FusedCandidate> = by_id.into_values().collect();
    fused.sort_by(compare_fused);
    fused
}

fn compare_fused(a: &FusedCandidate, b: &FusedCandidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.provenance.best_rank().cmp(&b.provenance.best_rank()))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use localrag_core::types::{SearchHit, SourceKind};

    fn ranked(ids: &[&str], source: SourceKind) -> Vec<ScoredCandidate> {
        let hits: Vec<SearchHit> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| SearchHit { id: id.to_string(), score: 1.0 - i as f32 * 0.1, source })
            .collect();
        ScoredCandidate::rank_hits(&hits, source)
    }

    #[test]
    fn enrollment_rate_scenario_orders_b_a_c_d() {
        let vector = ranked(&["A", "B", "C"], SourceKind::Vector);
        let lexical = ranked(&["B", "D", "A"], SourceKind::Lexical);
        let fused = reciprocal_rank_fusion(&[vector, lexical], DEFAULT_RRF_K);

        let ids: Vec<&str> = fused.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "C", "D"]);
        assert!((fused[0].score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);
        assert!((fused[1].score - (1.0 / 61.0 + 1.0 / 63.0)).abs() < 1e-12);
        assert_eq!(fused[2].score, fused[3].score);
        assert_eq!(fused[0].provenance.vector_rank, Some(2));
        assert_eq!(fused[0].provenance.lexical_rank, Some(1));
        assert_eq!(fused[3].provenance.vector_rank, None);
    }

    #[test]
    fn equal_scores_prefer_better_rank_then_id() {
        // z is rank 1 in vector, a is rank 1 in lexical: same score, same best rank.
        let vector = ranked(&["z", "m"], SourceKind::Vector);
        let lexical = ranked(&["a", "q"], SourceKind::Lexical);
        let fused = reciprocal_rank_fusion(&[vector, lexical], DEFAULT_RRF_K);
        let ids: Vec<&str> = fused.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "z", "m", "q"]);
    }

    #[test]
    fn single_list_keeps_its_order() {
        let only = ranked(&["3", "1", "2"], SourceKind::Lexical);
        let fused = reciprocal_rank_fusion(&[only, Vec::new()], DEFAULT_RRF_K);
        let ids: Vec<&str> = fused.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }

    #[test]
    fn empty_inputs_fuse_to_nothing() {
        assert!(reciprocal_rank_fusion(&[Vec::new(), Vec::new()], DEFAULT_RRF_K).is_empty());
        assert!(reciprocal_rank_fusion(&[], DEFAULT_RRF_K).is_empty());
    }

    #[test]
    fn first_in_both_beats_first_in_one() {
        let vector = ranked(&["both", "solo_v"], SourceKind::Vector);
        let lexical = ranked(&["both", "solo_l"], SourceKind::Lexical);
        let fused = reciprocal_rank_fusion(&[vector, lexical], 1);
        assert_eq!(fused[0].id, "both");
    }
}
