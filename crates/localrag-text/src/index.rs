use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::tokenizer::{TextAnalyzer, TokenStream};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use localrag_core::traits::LexicalIndex;
use localrag_core::types::{Chunk, SearchHit, SourceKind};

use crate::tantivy_utils::{build_analyzer, build_schema, register_tokenizer};

const WRITER_BUDGET_BYTES: usize = 50_000_000;

/// An immutable BM25 index over one corpus snapshot, held in RAM.
pub struct LexicalSnapshot {
	reader: IndexReader,
	analyzer: TextAnalyzer,
	id_field: Field,
	text_field: Field,
	doc_count: usize,
}

impl LexicalSnapshot {
	pub fn build(chunks: &[Chunk]) -> Result<Self> {
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let id_field = schema.get_field("id")?;
		let doc_id_field = schema.get_field("doc_id")?;
		let text_field = schema.get_field("text")?;

		let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_BUDGET_BYTES)?;
		for c in chunks {
			writer.add_document(doc!(
				id_field => c.id.clone(),
				doc_id_field => c.doc_id.clone(),
				text_field => c.content.clone(),
			))?;
		}
		writer.commit()?;

		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Self { reader, analyzer: build_analyzer(), id_field, text_field, doc_count: chunks.len() })
	}

	pub fn len(&self) -> usize { self.doc_count }

	pub fn is_empty(&self) -> bool { self.doc_count == 0 }

	/// Keyword search: a disjunction of the query's analyzed terms, scored
	/// with BM25. Query operators carry no meaning.
	pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		if k == 0 || self.doc_count == 0 || query.trim().is_empty() { return Ok(Vec::new()); }
		let terms = self.query_terms(query);
		if terms.is_empty() { return Ok(Vec::new()); }
		debug!(query, terms = terms.len(), "lexical query analyzed");
		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.into_iter()
			.map(|t| (Occur::Should, Box::new(TermQuery::new(t, IndexRecordOption::WithFreqs)) as Box<dyn Query>))
			.collect();
		let q = BooleanQuery::new(clauses);
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&q, &TopDocs::with_limit(k))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let Some(id) = doc.get_first(self.id_field).and_then(|v| v.as_str()) else { continue };
			hits.push(SearchHit { id: id.to_string(), score, source: SourceKind::Lexical });
		}
		Ok(hits)
	}

	fn query_terms(&self, query: &str) -> Vec<Term> {
		let mut analyzer = self.analyzer.clone();
		let mut stream = analyzer.token_stream(query);
		let mut terms: Vec<Term> = Vec::new();
		while stream.advance() {
			let term = Term::from_field_text(self.text_field, &stream.token().text);
			if !terms.contains(&term) { terms.push(term); }
		}
		terms
	}
}

/// Lexical index shared by concurrent queries.
///
/// Readers take a reference to the current snapshot; `reindex` builds a
/// complete replacement first and swaps it in, so a search never observes a
/// partially built index.
pub struct SharedLexicalIndex {
	current: RwLock<Arc<LexicalSnapshot>>,
}

impl SharedLexicalIndex {
	pub fn build(chunks: &[Chunk]) -> Result<Self> {
		let snapshot = LexicalSnapshot::build(chunks)?;
		info!(chunks = snapshot.len(), "lexical index built");
		Ok(Self { current: RwLock::new(Arc::new(snapshot)) })
	}

	pub fn snapshot(&self) -> Arc<LexicalSnapshot> {
		let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
		Arc::clone(&guard)
	}

	pub fn reindex(&self, chunks: &[Chunk]) -> Result<()> {
		let fresh = Arc::new(LexicalSnapshot::build(chunks)?);
		let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
		*guard = fresh;
		info!(chunks = chunks.len(), "lexical index swapped");
		Ok(())
	}
}

#[async_trait]
impl LexicalIndex for SharedLexicalIndex {
	async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		let snapshot = self.snapshot();
		let query = query.to_string();
		tokio::task::spawn_blocking(move || snapshot.search(&query, k)).await?
	}
}
