//! localrag-hybrid
//!
//! Turns a query into ranked evidence: vector and lexical search run
//! concurrently, their rankings are fused with RRF, and the fused candidates
//! are optionally re-scored by a pairwise relevance model.
pub mod fusion;
pub mod pipeline;
pub mod rerank;
pub mod retriever;

pub use fusion::{reciprocal_rank_fusion, FusedCandidate, DEFAULT_RRF_K};
pub use pipeline::RetrievalPipeline;
pub use rerank::Reranker;
#[cfg(feature = "cross-encoder")]
pub use rerank::CrossEncoderScorer;
pub use retriever::HybridRetriever;
