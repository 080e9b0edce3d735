use std::env;

use anyhow::Result;

use localrag_core::config::Config;
use localrag_core::types::RerankStatus;

#[tokio::main]
async fn main() -> Result<()> {
    localrag_cli::init_tracing();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <query> [--top-k N] [--json]", args[0]);
        eprintln!("Example: {} 'life insurance enrollment rate' --top-k 5", args[0]);
        std::process::exit(1);
    }
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;

    let query_text = &args[1];
    let mut top_k = settings.retrieval.top_k;
    let mut json = false;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--top-k" => match args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) {
                Some(k) => { top_k = k; i += 1; }
                None => { eprintln!("Error: --top-k requires a number"); std::process::exit(1); }
            },
            "--json" => json = true,
            other => { eprintln!("Unknown argument: {}", other); std::process::exit(1); }
        }
        i += 1;
    }

    let pipeline = localrag_cli::build_pipeline(&settings).await?;
    let outcome = pipeline.run(query_text, top_k).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("Found {} results for: \"{}\"", outcome.results.len(), query_text);
    for d in &outcome.degradations {
        println!("  degraded: {:?}", d);
    }
    for (i, r) in outcome.results.iter().enumerate() {
        let page = r.chunk.page.map(|p| format!(" p.{p}")).unwrap_or_default();
        let rerank = match r.rerank {
            RerankStatus::Scored { score } => format!("  rerank={:.4}", score),
            _ => String::new(),
        };
        println!("\n  {}. rrf={:.5}{}  id={}  source={}{}", i + 1, r.score, rerank, r.chunk.id, r.chunk.source, page);
        let ranks: Vec<String> = r
            .provenance
            .sources()
            .into_iter()
            .filter_map(|s| r.provenance.rank_for(s).map(|rank| format!("{s}#{rank}")))
            .collect();
        println!("     {}", ranks.join(" "));
        println!("     {}", snippet(&r.chunk.content, 200));
    }
    Ok(())
}

fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars { return flat; }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{cut}...")
}
