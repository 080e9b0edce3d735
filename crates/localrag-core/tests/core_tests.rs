use std::fs;
use tempfile::TempDir;

use localrag_core::traits::ChunkStore;
use localrag_core::types::ChunkKind;
use localrag_core::InMemoryChunkStore;

const SURVEY: &str = r#"{"id":"survey:p12:0","doc_id":"survey","source":"survey.pdf","page":12,"content":"The household enrollment rate for life insurance was 89.2%."}
{"id":"survey:p12:1","doc_id":"survey","source":"survey.pdf","page":12,"kind":"table","content":"| year | rate |"}
"#;

#[test]
fn load_single_jsonl_file() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("survey.jsonl");
    fs::write(&file, SURVEY).unwrap();

    let store = InMemoryChunkStore::load(&file).expect("load");

    assert_eq!(store.len(), 2);
    assert_eq!(store.chunks()[0].id, "survey:p12:0", "snapshot order is kept");
    assert_eq!(store.get("survey:p12:1").and_then(|c| c.kind), Some(ChunkKind::Table));
}

#[test]
fn load_directory_walks_nested_files_and_skips_duplicates() {
    let tmp = TempDir::new().unwrap();
    let nested = tmp.path().join("finance");
    fs::create_dir_all(&nested).unwrap();
    fs::write(tmp.path().join("a.jsonl"), SURVEY).unwrap();
    fs::write(nested.join("b.jsonl"), SURVEY).unwrap();
    fs::write(tmp.path().join("notes.txt"), "not a snapshot").unwrap();

    let store = InMemoryChunkStore::load(tmp.path()).expect("load dir");

    assert_eq!(store.len(), 2, "same ids in two files are stored once");
}

#[test]
fn malformed_line_reports_location() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("bad.jsonl");
    fs::write(&file, "{\"id\":\"x\"}\n").unwrap();

    let err = InMemoryChunkStore::load(&file).unwrap_err();
    assert!(format!("{err:#}").contains("bad.jsonl:1"));
}

#[tokio::test]
async fn chunk_store_lookup_misses_are_none() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("survey.jsonl");
    fs::write(&file, SURVEY).unwrap();
    let store = InMemoryChunkStore::load(&file).unwrap();

    assert!(store.get_chunk("survey:p12:0").await.unwrap().is_some());
    assert!(store.get_chunk("missing").await.unwrap().is_none());
}
