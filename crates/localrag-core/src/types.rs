//! Domain types shared by the lexical, vector, fusion and agent layers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// Structural origin of a chunk inside its source document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Paragraph,
    Table,
    Image,
}

/// An immutable unit of retrievable text produced by ingestion.
///
/// - `id`: globally unique chunk identifier
/// - `doc_id`: stable document identity
/// - `source`: original file name or URI of the document
/// - `page`: page number inside the source, when known
/// - `kind`: paragraph, table or image-derived text
/// - `content`: the text payload of the chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChunkKind>,
    pub content: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub meta: Meta,
}

impl Chunk {
    pub fn new(id: impl Into<String>, doc_id: impl Into<String>, source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            doc_id: doc_id.into(),
            source: source.into(),
            page: None,
            kind: None,
            content: content.into(),
            meta: Meta::new(),
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vector,
    Lexical,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Vector => f.write_str("vector"),
            SourceKind::Lexical => f.write_str("lexical"),
        }
    }
}

/// The minimal surface returned by all engines.
///
/// `id` matches `Chunk::id`. `score` is engine-specific but
/// higher is always better. `source` labels the origin engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub source: SourceKind,
}

/// A hit with its 1-based position inside one engine's ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub id: ChunkId,
    pub score: f32,
    pub rank: usize,
    pub source: SourceKind,
}

impl ScoredCandidate {
    /// Assign 1-based ranks to an engine's ordered hits.
    ///
    /// A chunk repeated in the same list keeps its first (best) rank.
    pub fn rank_hits(hits: &[SearchHit], source: SourceKind) -> Vec<ScoredCandidate> {
        let mut seen = std::collections::HashSet::new();
        let mut ranked = Vec::with_capacity(hits.len());
        for hit in hits {
            if !seen.insert(hit.id.as_str()) {
                continue;
            }
            ranked.push(ScoredCandidate { id: hit.id.clone(), score: hit.score, rank: ranked.len() + 1, source });
        }
        ranked
    }
}

/// Which rankings contributed to a fused result, and at what rank.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Provenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_rank: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexical_rank: Option<usize>,
}

impl Provenance {
    pub fn rank_for(&self, source: SourceKind) -> Option<usize> {
        match source {
            SourceKind::Vector => self.vector_rank,
            SourceKind::Lexical => self.lexical_rank,
        }
    }

    pub fn record(&mut self, source: SourceKind, rank: usize) {
        let slot = match source {
            SourceKind::Vector => &mut self.vector_rank,
            SourceKind::Lexical => &mut self.lexical_rank,
        };
        *slot = Some(slot.map_or(rank, |r| r.min(rank)));
    }

    pub fn sources(&self) -> Vec<SourceKind> {
        [SourceKind::Vector, SourceKind::Lexical].into_iter().filter(|s| self.rank_for(*s).is_some()).collect()
    }

    /// Smallest rank achieved in any contributing list.
    pub fn best_rank(&self) -> usize {
        [self.vector_rank, self.lexical_rank].into_iter().flatten().min().unwrap_or(usize::MAX)
    }
}

/// Outcome of the reranking stage for one result.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RerankStatus {
    /// Reranking was not part of this retrieval.
    #[default]
    NotRequested,
    /// Scored by the relevance model.
    Scored { score: f32 },
    /// The relevance model was unavailable; fused order was kept.
    PassThrough,
}

/// A chunk with a single fused relevance score and its provenance.
///
/// `score` is derived only from rank positions (RRF), never from the
/// engines' raw scores. `degraded` marks results produced while one of the
/// sources was unavailable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FusedResult {
    pub chunk: Chunk,
    pub score: f64,
    pub provenance: Provenance,
    pub degraded: bool,
    #[serde(default)]
    pub rerank: RerankStatus,
}

impl FusedResult {
    pub fn id(&self) -> &str {
        &self.chunk.id
    }

    pub fn is_reranked(&self) -> bool {
        matches!(self.rerank, RerankStatus::Scored { .. })
    }
}

/// Best-effort conditions met while answering. Never fatal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    SourceUnavailable { engine: SourceKind, reason: String },
    RerankerUnavailable { reason: String },
    AnalyzerFallback { reason: String },
    PlanTruncated { proposed: usize, kept: usize },
    ReflectionUnparsed { attempt: usize },
    NoEvidence,
}

/// Results of one retrieval call plus any degradations met on the way.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrievalOutcome {
    pub results: Vec<FusedResult>,
    pub degradations: Vec<Degradation>,
}

impl RetrievalOutcome {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Evidence selected for exactly one generation call.
///
/// Holds at most `top_k` results in relevance-descending order. Not `Clone`:
/// a context is built per generation attempt and consumed by it.
#[derive(Debug, PartialEq)]
pub struct RetrievalContext {
    results: Vec<FusedResult>,
}

impl RetrievalContext {
    pub fn new(mut results: Vec<FusedResult>, top_k: usize) -> Self {
        results.truncate(top_k);
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FusedResult> {
        self.results.iter()
    }

    pub fn into_results(self) -> Vec<FusedResult> {
        self.results
    }
}
