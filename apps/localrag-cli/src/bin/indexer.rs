use std::{env, fs};

use anyhow::Result;
use tracing::info;

use localrag_core::config::{expand_path, Config};
use localrag_vector::LanceVectorWriter;

const EMBED_BATCH: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    localrag_cli::init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let mut settings = config.settings()?;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut limit = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" => match args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) {
                Some(n) => { limit = Some(n); i += 1; }
                None => { eprintln!("Error: --limit requires a number"); std::process::exit(1); }
            },
            "--fake-embed" => settings.embed.use_fake = true,
            a if !a.starts_with('-') => settings.data.chunks_path = a.to_string(),
            other => { eprintln!("Unknown flag: {}", other); std::process::exit(1); }
        }
        i += 1;
    }

    println!("localrag indexer\n================");
    println!("Chunks: {}", settings.data.chunks_path);
    let store = localrag_cli::load_chunks(&settings)?;
    let mut chunks = store.chunks().to_vec();
    if let Some(n) = limit { chunks.truncate(n); println!("Limiting to {} chunks", n); }
    if chunks.is_empty() {
        println!("Nothing to index.");
        return Ok(());
    }

    let embedder = localrag_cli::load_embedder(&settings)?;
    let mut embeddings = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(EMBED_BATCH) {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        embeddings.extend(embedder.embed_batch(&texts)?);
    }
    info!(chunks = chunks.len(), dim = embedder.dim(), "embedded chunks");

    let lancedb_path = expand_path(&settings.data.lancedb_dir);
    if lancedb_path.exists() { fs::remove_dir_all(&lancedb_path)?; }
    fs::create_dir_all(&lancedb_path)?;
    let writer = LanceVectorWriter::new(&lancedb_path, &settings.data.table).await?;
    let written = writer.index(&chunks, &embeddings).await?;

    println!("\nIndexed {} chunks into {} ({})", written, lancedb_path.display(), settings.data.table);
    println!("To search, use: cargo run --bin localrag-search '<query>'");
    Ok(())
}
