//! Pairwise re-scoring of fused candidates.
//!
//! A pure re-sort: candidates are reordered and truncated, never added. When
//! the relevance model is missing, errors, times out or returns a malformed or
//! non-finite score list, the fused order is passed through truncated to
//! `top_k` and marked `RerankStatus::PassThrough`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use localrag_core::error::{Error, Result};
use localrag_core::traits::RelevanceScorer;
use localrag_core::types::{Degradation, FusedResult, RerankStatus};

pub struct Reranker {
    scorer: Option<Arc<dyn RelevanceScorer>>,
    timeout: Duration,
}

impl Reranker {
    pub fn new(scorer: Option<Arc<dyn RelevanceScorer>>, timeout: Duration) -> Self {
        Self { scorer, timeout }
    }

    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<FusedResult>,
        top_k: usize,
    ) -> (Vec<FusedResult>, Option<Degradation>) {
        if candidates.is_empty() || top_k == 0 {
            return (Vec::new(), None);
        }
        let scores = match self.score(query, &candidates).await {
            Ok(scores) => scores,
            Err(e) => return pass_through(candidates, top_k, e),
        };

        let mut scored: Vec<(f32, FusedResult)> = scores.into_iter().zip(candidates).collect();
        // Stable: equal relevance keeps fused order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        let reranked: Vec<FusedResult> = scored
            .into_iter()
            .take(top_k)
            .map(|(score, mut r)| {
                r.rerank = RerankStatus::Scored { score };
                r
            })
            .collect();
        debug!(kept = reranked.len(), "reranked");
        (reranked, None)
    }

    /// One finite score per candidate, or `Error::RerankerUnavailable`.
    async fn score(&self, query: &str, candidates: &[FusedResult]) -> Result<Vec<f32>> {
        let Some(scorer) = &self.scorer else {
            return Err(Error::RerankerUnavailable("no relevance model configured".into()));
        };
        let texts: Vec<String> = candidates.iter().map(|c| c.chunk.content.clone()).collect();
        let scores = tokio::time::timeout(self.timeout, scorer.score_pairs(query, &texts))
            .await
            .map_err(|_| Error::RerankerUnavailable(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| Error::RerankerUnavailable(format!("{e:#}")))?;
        if scores.len() != candidates.len() {
            return Err(Error::RerankerUnavailable(format!(
                "relevance model returned {} scores for {} candidates",
                scores.len(),
                candidates.len()
            )));
        }
        if let Some(i) = scores.iter().position(|s| !s.is_finite()) {
            return Err(Error::RerankerUnavailable(format!("non-finite relevance score {} at position {i}", scores[i])));
        }
        Ok(scores)
    }
}

fn pass_through(mut candidates: Vec<FusedResult>, top_k: usize, cause: Error) -> (Vec<FusedResult>, Option<Degradation>) {
    warn!(error = %cause, "keeping fused order");
    candidates.truncate(top_k);
    for c in &mut candidates {
        c.rerank = RerankStatus::PassThrough;
    }
    (candidates, cause.degradation())
}

#[cfg(feature = "cross-encoder")]
mod cross_encoder {
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use fastembed::{RerankInitOptions, RerankerModel, TextRerank};

    use localrag_core::traits::RelevanceScorer;

    /// fastembed cross-encoder behind the relevance-scoring seam.
    pub struct CrossEncoderScorer {
        model: Arc<Mutex<TextRerank>>,
    }

    impl CrossEncoderScorer {
        pub fn new() -> Result<Self> {
            let model = TextRerank::try_new(RerankInitOptions::new(RerankerModel::BGERerankerBase))?;
            Ok(Self { model: Arc::new(Mutex::new(model)) })
        }
    }

    #[async_trait]
    impl RelevanceScorer for CrossEncoderScorer {
        async fn score_pairs(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
            let model = Arc::clone(&self.model);
            let query = query.to_string();
            let texts = texts.to_vec();
            tokio::task::spawn_blocking(move || {
                let mut guard = model.lock().map_err(|_| anyhow!("cross-encoder lock poisoned"))?;
                let docs: Vec<&str> = texts.iter().map(String::as_str).collect();
                let results = guard.rerank(query.as_str(), docs, false, None)?;
                // fastembed returns best first; map back to input order.
                let mut scores = vec![f32::NEG_INFINITY; texts.len()];
                for r in results {
                    if let Some(slot) = scores.get_mut(r.index) {
                        *slot = r.score;
                    }
                }
                Ok(scores)
            })
            .await?
        }
    }
}

#[cfg(feature = "cross-encoder")]
pub use cross_encoder::CrossEncoderScorer;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use localrag_core::types::{Chunk, Provenance};

    fn fused(id: &str, text: &str) -> FusedResult {
        FusedResult {
            chunk: Chunk::new(id, "doc", "doc.pdf", text),
            score: 0.0,
            provenance: Provenance::default(),
            degraded: false,
            rerank: RerankStatus::NotRequested,
        }
    }

    struct LengthScorer;

    #[async_trait]
    impl RelevanceScorer for LengthScorer {
        async fn score_pairs(&self, _query: &str, texts: &[String]) -> anyhow::Result<Vec<f32>> {
            Ok(texts.iter().map(|t| t.len() as f32).collect())
        }
    }

    struct BrokenScorer;

    #[async_trait]
    impl RelevanceScorer for BrokenScorer {
        async fn score_pairs(&self, _query: &str, _texts: &[String]) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("model not loaded")
        }
    }

    struct ShortScorer;

    #[async_trait]
    impl RelevanceScorer for ShortScorer {
        async fn score_pairs(&self, _query: &str, _texts: &[String]) -> anyhow::Result<Vec<f32>> {
            Ok(vec![1.0])
        }
    }

    /// NaN for every third candidate, the input position otherwise.
    struct NanScorer;

    #[async_trait]
    impl RelevanceScorer for NanScorer {
        async fn score_pairs(&self, _query: &str, texts: &[String]) -> anyhow::Result<Vec<f32>> {
            Ok((0..texts.len()).map(|i| if i % 3 == 1 { f32::NAN } else { i as f32 }).collect())
        }
    }

    fn candidates() -> Vec<FusedResult> {
        vec![fused("a", "x"), fused("b", "xxx"), fused("c", "xx"), fused("d", "xxx")]
    }

    #[tokio::test]
    async fn sorts_by_relevance_and_keeps_fused_order_on_ties() {
        let r = Reranker::new(Some(Arc::new(LengthScorer)), Duration::from_secs(1));
        let (out, degradation) = r.rerank("q", candidates(), 3).await;
        let ids: Vec<&str> = out.iter().map(|f| f.id()).collect();
        assert_eq!(ids, vec!["b", "d", "c"]);
        assert!(out.iter().all(|f| f.is_reranked()));
        assert!(degradation.is_none());
    }

    #[tokio::test]
    async fn failing_model_passes_fused_order_through() {
        for scorer in [Some(Arc::new(BrokenScorer) as Arc<dyn RelevanceScorer>), Some(Arc::new(ShortScorer)), None] {
            let r = Reranker::new(scorer, Duration::from_secs(1));
            let (out, degradation) = r.rerank("q", candidates(), 2).await;
            let ids: Vec<&str> = out.iter().map(|f| f.id()).collect();
            assert_eq!(ids, vec!["a", "b"]);
            assert!(out.iter().all(|f| f.rerank == RerankStatus::PassThrough));
            assert!(matches!(degradation, Some(Degradation::RerankerUnavailable { .. })));
        }
    }

    #[tokio::test]
    async fn non_finite_scores_pass_fused_order_through() {
        let many: Vec<FusedResult> = (0..12).map(|i| fused(&format!("c{i}"), "x")).collect();
        let r = Reranker::new(Some(Arc::new(NanScorer)), Duration::from_secs(1));
        let (out, degradation) = r.rerank("q", many, 4).await;
        let ids: Vec<&str> = out.iter().map(|f| f.id()).collect();
        assert_eq!(ids, vec!["c0", "c1", "c2", "c3"]);
        assert!(out.iter().all(|f| f.rerank == RerankStatus::PassThrough));
        match degradation {
            Some(Degradation::RerankerUnavailable { reason }) => assert!(reason.contains("non-finite")),
            other => panic!("unexpected degradation {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_candidates_skip_the_model() {
        let r = Reranker::new(Some(Arc::new(BrokenScorer)), Duration::from_secs(1));
        let (out, degradation) = r.rerank("q", Vec::new(), 3).await;
        assert!(out.is_empty());
        assert!(degradation.is_none());
    }
}
