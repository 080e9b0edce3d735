//! Bulk writer from (chunk, embedding) pairs into a LanceDB table.
use anyhow::{bail, Result};
use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use localrag_core::types::Chunk;

use crate::schema::build_arrow_schema;
use crate::table::{open_db, table_exists};

const BATCH_SIZE: usize = 1000;

pub struct LanceVectorWriter { db: Connection, table_name: String }

impl LanceVectorWriter {
	pub async fn new(db_path: &Path, table_name: &str) -> Result<Self> {
		let db = open_db(db_path.to_string_lossy().as_ref()).await?;
		Ok(Self { db, table_name: table_name.to_string() })
	}

	/// Append chunks with their embeddings, creating the table on first write.
	pub async fn index(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize> {
		if chunks.is_empty() { info!("no chunks to index"); return Ok(0); }
		if chunks.len() != embeddings.len() {
			bail!("{} chunks but {} embeddings", chunks.len(), embeddings.len());
		}
		let dim = embeddings[0].len();
		if dim == 0 || embeddings.iter().any(|e| e.len() != dim) {
			bail!("embeddings must share one non-zero dimension");
		}
		info!(chunks = chunks.len(), table = %self.table_name, dim, "indexing into LanceDB");
		let pb = ProgressBar::new(chunks.len() as u64);
		pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?.progress_chars("#>-"));
		let mut processed = 0usize;
		for (batch_chunks, batch_vecs) in chunks.chunks(BATCH_SIZE).zip(embeddings.chunks(BATCH_SIZE)) {
			let batch = to_record_batch(batch_chunks, batch_vecs, dim as i32)?;
			self.insert_batch(batch).await?;
			processed += batch_chunks.len();
			pb.set_position(processed as u64);
		}
		pb.finish_with_message("done");
		info!(processed, table = %self.table_name, "LanceDB indexing completed");
		Ok(processed)
	}

	async fn insert_batch(&self, batch: RecordBatch) -> Result<()> {
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		if table_exists(&self.db, &self.table_name).await? {
			self.db.open_table(&self.table_name).execute().await?.add(reader).execute().await?;
		} else {
			self.db.create_table(&self.table_name, reader).execute().await?;
		}
		Ok(())
	}
}

fn to_record_batch(chunks: &[Chunk], embeddings: &[Vec<f32>], dim: i32) -> Result<RecordBatch> {
	let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
	let doc_ids: Vec<&str> = chunks.iter().map(|c| c.doc_id.as_str()).collect();
	let sources: Vec<&str> = chunks.iter().map(|c| c.source.as_str()).collect();
	let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
	let vectors = embeddings.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
	let batch = RecordBatch::try_new(build_arrow_schema(dim), vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(StringArray::from(doc_ids)),
		Arc::new(StringArray::from(sources)),
		Arc::new(StringArray::from(contents)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim)),
	])?;
	Ok(batch)
}
