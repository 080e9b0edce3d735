use async_trait::async_trait;
use tracing::info;

use localrag_core::error::Result;
use localrag_core::traits::EvidenceRetriever;
use localrag_core::types::RetrievalOutcome;

use crate::rerank::Reranker;
use crate::retriever::HybridRetriever;

/// Hybrid retrieval followed, when enabled, by reranking.
///
/// With a reranker the retriever is asked for `top_k * rerank_candidate_factor`
/// fused candidates and the reranker keeps `top_k` of them.
pub struct RetrievalPipeline {
    retriever: HybridRetriever,
    reranker: Option<Reranker>,
}

impl RetrievalPipeline {
    pub fn new(retriever: HybridRetriever, reranker: Option<Reranker>) -> Self {
        let reranker = reranker.filter(|_| retriever.settings().use_rerank);
        Self { retriever, reranker }
    }

    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    pub async fn run(&self, query: &str, top_k: usize) -> Result<RetrievalOutcome> {
        let Some(reranker) = &self.reranker else {
            return self.retriever.retrieve(query, top_k).await;
        };
        let pool = top_k.saturating_mul(self.retriever.settings().rerank_candidate_factor.max(1));
        let RetrievalOutcome { results, mut degradations } = self.retriever.retrieve(query, pool).await?;
        let candidates = results.len();
        let (results, degradation) = reranker.rerank(query, results, top_k).await;
        degradations.extend(degradation);
        info!(candidates, kept = results.len(), "retrieval pipeline done");
        Ok(RetrievalOutcome { results, degradations })
    }
}

#[async_trait]
impl EvidenceRetriever for RetrievalPipeline {
    async fn search(&self, query: &str, top_k: usize) -> Result<RetrievalOutcome> {
        self.run(query, top_k).await
    }
}
