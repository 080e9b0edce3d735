#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use proptest::prelude::*;

use common::{fused, Call, FakeRetriever, ScriptedCompletion};
use localrag_agent::{heuristic_plan, Orchestrator, QueryAnalyzer};
use localrag_core::config::{AgentSettings, AnalyzerKind};
use localrag_core::CancellationToken;

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(fut)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Scores that never reach the threshold exhaust the retry budget and stop.
    #[test]
    fn generation_attempts_are_bounded(max_retries in 0usize..4, score in 1u8..4) {
        let mut completion = ScriptedCompletion::new();
        for _ in 0..=max_retries + 1 {
            completion = completion.reflection(&format!("{{\"score\": {score}}}"));
        }
        let completion = Arc::new(completion);
        let settings = AgentSettings { max_retries, ..AgentSettings::default() };
        let retriever = Arc::new(FakeRetriever::returning(vec![fused("doc:p1:0", 0.03)]));
        let orchestrator = Orchestrator::from_settings(retriever, completion.clone(), settings, 3);

        let out = block_on(orchestrator.answer("What was the rate?", &CancellationToken::new())).unwrap();

        prop_assert_eq!(out.metadata.attempts, max_retries + 1);
        prop_assert_eq!(completion.prompts(Call::Answer).len(), max_retries + 1);
        prop_assert_eq!(out.metadata.final_score, Some(score as f32));
    }

    #[test]
    fn analyzer_bounds_heuristic_plans(parts in prop::collection::vec("[a-z]{2,8} [a-z]{2,8}", 1..10), max in 1usize..6) {
        let question = parts.join("? ") + "?";
        let plan = heuristic_plan(&question);
        prop_assert!(plan.sub_questions.iter().all(|q| !q.trim().is_empty()));

        let analyzer = QueryAnalyzer::heuristic(max);
        let (bounded, _) = block_on(analyzer.analyze(&question));
        prop_assert!(bounded.sub_questions.len() <= max);
        prop_assert_eq!(bounded.is_complex(), !bounded.sub_questions.is_empty());
    }

    #[test]
    fn model_plans_are_bounded(n in 0usize..12, max in 1usize..6) {
        let subs: Vec<String> = (0..n).map(|i| format!("\"sub question {i}\"")).collect();
        let reply = format!("{{\"query_type\": \"complex\", \"reasoning\": \"\", \"sub_queries\": [{}]}}", subs.join(", "));
        let completion = Arc::new(ScriptedCompletion::new().analysis(&reply));
        let settings = AgentSettings { analyzer: AnalyzerKind::Llm, max_sub_questions: max, ..AgentSettings::default() };
        let analyzer = QueryAnalyzer::from_settings(&settings, completion);

        let (plan, _) = block_on(analyzer.analyze("compare a and b"));

        prop_assert_eq!(plan.sub_questions.len(), n.min(max));
        prop_assert_eq!(plan.is_complex(), n > 0);
    }
}
