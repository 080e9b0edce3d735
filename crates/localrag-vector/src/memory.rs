//! Brute-force cosine index for small corpora and tests.
use anyhow::{bail, Result};
use async_trait::async_trait;

use localrag_core::traits::VectorIndex;
use localrag_core::types::{ChunkId, SearchHit, SourceKind};

#[derive(Debug, Default, Clone)]
pub struct InMemoryVectorIndex {
    entries: Vec<(ChunkId, Vec<f32>)>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_embeddings(ids: Vec<ChunkId>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if ids.len() != embeddings.len() {
            bail!("{} ids but {} embeddings", ids.len(), embeddings.len());
        }
        Ok(Self { entries: ids.into_iter().zip(embeddings).collect() })
    }

    pub fn insert(&mut self, id: impl Into<ChunkId>, embedding: Vec<f32>) {
        self.entries.push((id.into(), embedding));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn search(&self, query_vec: &[f32], k: usize) -> Vec<SearchHit> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, (_, v))| v.len() == query_vec.len())
            .map(|(i, (_, v))| (i, cosine(query_vec, v)))
            .filter(|(_, s)| s.is_finite())
            .collect();
        // Equal scores keep insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| SearchHit { id: self.entries[i].0.clone(), score, source: SourceKind::Vector })
            .collect()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        Ok(self.search(query_vec, k))
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}
