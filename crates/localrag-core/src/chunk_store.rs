//! In-memory chunk store loaded from a JSON Lines corpus snapshot.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::traits::ChunkStore;
use crate::types::Chunk;

/// Chunks kept in snapshot order with an id index for lookups.
#[derive(Debug, Default, Clone)]
pub struct InMemoryChunkStore {
    chunks: Vec<Chunk>,
    by_id: HashMap<String, usize>,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from chunks; a repeated id keeps its first occurrence.
    pub fn from_chunks(chunks: impl IntoIterator<Item = Chunk>) -> Self {
        let mut store = Self::new();
        for chunk in chunks {
            store.insert(chunk);
        }
        store
    }

    /// Load a `.jsonl` file, or every `.jsonl` file under a directory.
    pub fn load(path: &Path) -> Result<Self> {
        let files = if path.is_dir() { list_jsonl_files(path) } else { vec![path.to_path_buf()] };
        let mut store = Self::new();
        for file in &files {
            let text = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
            for (line_no, line) in text.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let chunk: Chunk = serde_json::from_str(line)
                    .with_context(|| format!("{}:{}: invalid chunk record", file.display(), line_no + 1))?;
                store.insert(chunk);
            }
        }
        info!(files = files.len(), chunks = store.len(), "loaded chunk snapshot");
        Ok(store)
    }

    pub fn insert(&mut self, chunk: Chunk) {
        if self.by_id.contains_key(&chunk.id) {
            warn!(id = %chunk.id, "duplicate chunk id ignored");
            return;
        }
        self.by_id.insert(chunk.id.clone(), self.chunks.len());
        self.chunks.push(chunk);
    }

    pub fn get(&self, id: &str) -> Option<&Chunk> {
        self.by_id.get(id).map(|&i| &self.chunks[i])
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn get_chunk(&self, id: &str) -> Result<Option<Chunk>> {
        Ok(self.get(id).cloned())
    }
}

fn list_jsonl_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("jsonl"))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}
