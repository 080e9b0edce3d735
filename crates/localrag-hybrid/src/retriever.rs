//! Hybrid retriever: concurrent vector + lexical fetch, RRF, chunk resolution.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use localrag_core::config::RetrievalSettings;
use localrag_core::error::{Error, Result};
use localrag_core::traits::{ChunkStore, Embedder, LexicalIndex, VectorIndex};
use localrag_core::types::{
    FusedResult, RerankStatus, RetrievalOutcome, ScoredCandidate, SearchHit, SourceKind,
};

use crate::fusion::reciprocal_rank_fusion;

pub struct HybridRetriever {
    embedder: Arc<dyn Embedder>,
    vector: Arc<dyn VectorIndex>,
    lexical: Arc<dyn LexicalIndex>,
    chunks: Arc<dyn ChunkStore>,
    settings: RetrievalSettings,
}

impl HybridRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector: Arc<dyn VectorIndex>,
        lexical: Arc<dyn LexicalIndex>,
        chunks: Arc<dyn ChunkStore>,
        settings: RetrievalSettings,
    ) -> Self {
        Self { embedder, vector, lexical, chunks, settings }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Up to `top_k` fused results for `query`, best first.
    ///
    /// A failed or timed-out source is treated as empty: the other source's
    /// ranking is used alone, every result is marked `degraded`, and the
    /// failure is reported in `degradations`. Both sources empty is an empty
    /// outcome, not an error.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<RetrievalOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidQuery("query is empty".into()));
        }
        if top_k == 0 {
            return Err(Error::InvalidQuery("top_k must be at least 1".into()));
        }
        let over_fetch = top_k.saturating_mul(self.settings.over_fetch_factor.max(1));

        let (vector, lexical) = tokio::join!(
            fetch(SourceKind::Vector, self.settings.vector_timeout(), self.vector_hits(query, over_fetch)),
            fetch(SourceKind::Lexical, self.settings.lexical_timeout(), self.lexical.search(query, over_fetch)),
        );

        let mut degradations = Vec::new();
        let mut lists = Vec::with_capacity(2);
        for (engine, fetched) in [(SourceKind::Vector, vector), (SourceKind::Lexical, lexical)] {
            match fetched {
                Ok(hits) => {
                    debug!(%engine, hits = hits.len(), "source returned");
                    lists.push(ScoredCandidate::rank_hits(&hits, engine));
                }
                Err(e) => {
                    warn!(error = %e, "degrading to single source");
                    degradations.extend(e.degradation());
                }
            }
        }
        let degraded = !degradations.is_empty();

        let fused = reciprocal_rank_fusion(&lists, self.settings.rrf_k);
        let mut results = Vec::with_capacity(top_k.min(fused.len()));
        for cand in fused {
            if results.len() == top_k {
                break;
            }
            let chunk = match self.chunks.get_chunk(&cand.id).await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    warn!(id = %cand.id, "fused id missing from chunk store; skipped");
                    continue;
                }
                Err(e) => {
                    warn!(id = %cand.id, error = %e, "chunk lookup failed; skipped");
                    continue;
                }
            };
            results.push(FusedResult {
                chunk,
                score: cand.score,
                provenance: cand.provenance,
                degraded,
                rerank: RerankStatus::NotRequested,
            });
        }
        debug!(query, top_k, results = results.len(), degraded, "hybrid retrieval done");
        Ok(RetrievalOutcome { results, degradations })
    }

    async fn vector_hits(&self, query: &str, k: usize) -> anyhow::Result<Vec<SearchHit>> {
        let embedder = Arc::clone(&self.embedder);
        let text = vec![query.to_string()];
        let mut embedded = tokio::task::spawn_blocking(move || embedder.embed_batch(&text)).await??;
        let query_vec = embedded.pop().ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))?;
        self.vector.search_vec(&query_vec, k).await
    }
}

async fn fetch<F>(engine: SourceKind, after: Duration, fut: F) -> Result<Vec<SearchHit>>
where
    F: std::future::Future<Output = anyhow::Result<Vec<SearchHit>>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(Ok(hits)) => Ok(hits),
        Ok(Err(e)) => Err(Error::SourceUnavailable { engine, reason: format!("{e:#}") }),
        Err(_) => Err(Error::SourceUnavailable { engine, reason: format!("timed out after {after:?}") }),
    }
}
