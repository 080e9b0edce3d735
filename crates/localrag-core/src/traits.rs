//! Collaborator seams. Everything outside the fusion engine and the agent
//! loop is reached through these traits and shared as `Arc<dyn _>`.

use async_trait::async_trait;

use crate::types::{Chunk, RetrievalOutcome, SearchHit};

/// Embedding-producing function handed to the retriever.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Nearest-neighbour search over chunk embeddings. Hits are ordered best first.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search_vec(&self, query_vec: &[f32], k: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// Keyword search over chunk text. Hits are ordered best first.
#[async_trait]
pub trait LexicalIndex: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// Stateless, batched (query, passage) relevance model.
///
/// Must return exactly one score per input text, higher is more relevant.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    async fn score_pairs(&self, query: &str, texts: &[String]) -> anyhow::Result<Vec<f32>>;
}

/// Language-completion collaborator used for analysis, answers and reflection.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str, system_instructions: &str, max_tokens: usize) -> anyhow::Result<String>;
}

/// Read-only chunk lookup.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn get_chunk(&self, id: &str) -> anyhow::Result<Option<Chunk>>;
}

/// Query-to-evidence retrieval as seen by the agent loop.
#[async_trait]
pub trait EvidenceRetriever: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> crate::error::Result<RetrievalOutcome>;
}
