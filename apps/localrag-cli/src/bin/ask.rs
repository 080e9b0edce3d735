use std::env;
use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use localrag_agent::{build_completion, Orchestrator};
use localrag_core::config::{AgentMode, Config};
use localrag_core::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    localrag_cli::init_tracing();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <question> [--naive] [--json]", args[0]);
        eprintln!("Example: {} 'Compare the 2018 and 2021 enrollment rates'", args[0]);
        std::process::exit(1);
    }
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let mut settings = config.settings()?;

    let question = &args[1];
    let mut json = false;
    for a in &args[2..] {
        match a.as_str() {
            "--naive" => settings.agent.mode = AgentMode::Naive,
            "--json" => json = true,
            other => { eprintln!("Unknown argument: {}", other); std::process::exit(1); }
        }
    }

    let pipeline = localrag_cli::build_pipeline(&settings).await?;
    let completion = build_completion(&settings.llm)?;
    let orchestrator = Orchestrator::from_settings(Arc::new(pipeline), completion, settings.agent.clone(), settings.retrieval.top_k);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling");
            on_signal.cancel();
        }
    });

    let answer = orchestrator.answer(question, &cancel).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    println!("{}\n", answer.answer);
    if !answer.citations.is_empty() {
        println!("Sources:");
        for id in &answer.citations {
            if let Some(r) = answer.sources.iter().find(|r| &r.chunk.id == id) {
                let page = r.chunk.page.map(|p| format!(" p.{p}")).unwrap_or_default();
                println!("  - {} ({}{})", id, r.chunk.source, page);
            }
        }
    }
    let m = &answer.metadata;
    println!(
        "\nstrategy={:?} attempts={} score={} stages={:?}",
        m.strategy,
        m.attempts,
        m.final_score.map(|s| format!("{s:.2}")).unwrap_or_else(|| "-".into()),
        m.stages
    );
    if !m.sub_questions.is_empty() { println!("sub-questions: {:?}", m.sub_questions); }
    for d in &m.degradations { println!("degraded: {:?}", d); }
    Ok(())
}
