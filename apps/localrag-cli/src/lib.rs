//! Shared wiring for the localrag binaries.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use localrag_core::config::{expand_path, Settings};
use localrag_core::traits::{Embedder, RelevanceScorer};
use localrag_core::InMemoryChunkStore;
use localrag_embed::get_default_embedder;
use localrag_hybrid::{HybridRetriever, Reranker, RetrievalPipeline};
use localrag_text::SharedLexicalIndex;
use localrag_vector::LanceVectorIndex;

/// Log to stderr so stdout stays clean for answers and `--json` output.
/// `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

pub fn load_chunks(settings: &Settings) -> Result<InMemoryChunkStore> {
    let path = expand_path(&settings.data.chunks_path);
    InMemoryChunkStore::load(&path).with_context(|| format!("loading chunks from {}", path.display()))
}

pub fn load_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    get_default_embedder(&settings.embed)
}

/// Hybrid retrieval over the chunk snapshot, the on-disk vector table and a
/// lexical index built in memory at startup.
pub async fn build_pipeline(settings: &Settings) -> Result<RetrievalPipeline> {
    let chunks = load_chunks(settings)?;
    let lexical = SharedLexicalIndex::build(chunks.chunks())?;
    let embedder = load_embedder(settings)?;
    let vector = LanceVectorIndex::open(&expand_path(&settings.data.lancedb_dir), &settings.data.table).await?;
    let retriever = HybridRetriever::new(
        embedder,
        Arc::new(vector),
        Arc::new(lexical),
        Arc::new(chunks),
        settings.retrieval.clone(),
    );
    Ok(RetrievalPipeline::new(retriever, build_reranker(settings)))
}

/// `None` only when reranking is switched off. A relevance model that cannot
/// be loaded still yields a reranker, which passes the fused order through
/// and records the degradation on every query.
pub fn build_reranker(settings: &Settings) -> Option<Reranker> {
    if !settings.retrieval.use_rerank {
        info!("reranking disabled by configuration");
        return None;
    }
    let scorer = load_scorer();
    if scorer.is_none() {
        warn!("no relevance model available; results keep fused order");
    }
    Some(Reranker::new(scorer, settings.retrieval.rerank_timeout()))
}

#[cfg(feature = "cross-encoder")]
fn load_scorer() -> Option<Arc<dyn RelevanceScorer>> {
    match localrag_hybrid::CrossEncoderScorer::new() {
        Ok(scorer) => {
            info!("cross-encoder reranker loaded");
            Some(Arc::new(scorer))
        }
        Err(e) => {
            warn!(error = %e, "cross-encoder failed to load");
            None
        }
    }
}

#[cfg(not(feature = "cross-encoder"))]
fn load_scorer() -> Option<Arc<dyn RelevanceScorer>> {
    warn!("built without the cross-encoder feature");
    None
}
