use anyhow::{anyhow, Result};
use arrow_array::{Float32Array, RecordBatch, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Connection;
use std::path::Path;

use localrag_core::traits::VectorIndex;
use localrag_core::types::{SearchHit, SourceKind};

use crate::table::open_db;

/// Nearest-neighbour search over a LanceDB chunk table.
pub struct LanceVectorIndex { db: Connection, table_name: String }

impl LanceVectorIndex {
	pub async fn open(db_path: &Path, table_name: &str) -> Result<Self> {
		let db = open_db(db_path.to_string_lossy().as_ref()).await?;
		Ok(Self { db, table_name: table_name.to_string() })
	}

	pub async fn count_rows(&self) -> Result<usize> {
		let table = self.db.open_table(&self.table_name).execute().await?;
		Ok(table.count_rows(None).await?)
	}
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
	async fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
		if k == 0 { return Ok(Vec::new()); }
		let table = self.db.open_table(&self.table_name).execute().await?;
		let mut stream = table.vector_search(query_vec.to_vec())?.limit(k).execute().await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			hits.extend(hits_from_batch(&batch)?);
		}
		Ok(hits)
	}
}

fn hits_from_batch(batch: &RecordBatch) -> Result<Vec<SearchHit>> {
	let ids = batch.column_by_name("id").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("id column missing"))?;
	let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
	Ok((0..batch.num_rows())
		.map(|i| SearchHit {
			id: ids.value(i).to_string(),
			score: distances.map_or(0.0, |d| 1.0 - d.value(i)),
			source: SourceKind::Vector,
		})
		.collect())
}
