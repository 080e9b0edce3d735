//! localrag-vector
//!
//! Vector side of hybrid retrieval: a LanceDB-backed chunk table (writer and
//! nearest-neighbour search) plus an in-memory cosine index.
pub mod memory;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use memory::InMemoryVectorIndex;
pub use search::LanceVectorIndex;
pub use writer::LanceVectorWriter;
