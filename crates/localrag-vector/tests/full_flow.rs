use localrag_core::traits::VectorIndex;
use localrag_core::types::{Chunk, SourceKind};
use localrag_vector::{LanceVectorIndex, LanceVectorWriter};
use tempfile::TempDir;

fn unit(dim: usize, hot: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[hot] = 1.0;
    v
}

#[tokio::test]
async fn lancedb_write_then_search() {
    let tmp = TempDir::new().expect("tmp");
    let table = "chunks_test_tmp";
    let chunks: Vec<Chunk> = (0..8)
        .map(|i| Chunk::new(format!("doc{i}:p1:0"), format!("doc{i}"), format!("doc{i}.pdf"), format!("chunk number {i}")))
        .collect();
    let embeddings: Vec<Vec<f32>> = (0..8).map(|i| unit(8, i)).collect();

    let writer = LanceVectorWriter::new(tmp.path(), table).await.expect("writer");
    assert_eq!(writer.index(&chunks, &embeddings).await.expect("index"), 8);

    let index = LanceVectorIndex::open(tmp.path(), table).await.expect("open");
    assert_eq!(index.count_rows().await.unwrap(), 8);
    let hits = index.search_vec(&unit(8, 3), 3).await.expect("search");
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, "doc3:p1:0");
    assert!(hits.iter().all(|h| h.source == SourceKind::Vector));
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test]
async fn mismatched_embeddings_are_rejected() {
    let tmp = TempDir::new().expect("tmp");
    let writer = LanceVectorWriter::new(tmp.path(), "t").await.expect("writer");
    let chunks = vec![Chunk::new("a", "a", "a.pdf", "text")];
    assert!(writer.index(&chunks, &[]).await.is_err());
}

#[tokio::test]
async fn missing_table_is_an_error() {
    let tmp = TempDir::new().expect("tmp");
    let index = LanceVectorIndex::open(tmp.path(), "absent").await.expect("open");
    assert!(index.search_vec(&[1.0, 0.0], 3).await.is_err());
}
