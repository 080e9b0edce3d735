//! localrag-core
//!
//! Domain types, collaborator traits, error taxonomy and configuration shared
//! by the retrieval and agent crates.
#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod cancel;
pub mod chunk_store;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use cancel::CancellationToken;
pub use chunk_store::InMemoryChunkStore;
pub use error::{Error, Result};
