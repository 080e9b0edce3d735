//! localrag-text
//!
//! Tantivy-based BM25 index over chunk text. The index lives in RAM and is
//! rebuilt whole from a chunk snapshot; see `index::SharedLexicalIndex`.
pub mod tantivy_utils;
pub mod index;

pub use index::{LexicalSnapshot, SharedLexicalIndex};
