//! localrag-agent
//!
//! Agentic answering on top of an evidence retriever: query analysis,
//! optional decomposition, answer generation with citations, and
//! self-reflection with a bounded retry budget.
pub mod critic;
pub mod generator;
pub mod llm;
pub mod orchestrator;
pub mod plan;
pub mod prompts;
pub mod state;

pub use critic::{parse_verdict, ReflectionCritic, ReflectionVerdict};
pub use generator::{extract_citations, AnswerGenerator, Draft};
pub use llm::{build_completion, MockCompletion, OpenAiCompletion};
pub use orchestrator::Orchestrator;
pub use plan::{heuristic_plan, parse_plan, Complexity, QueryAnalyzer, QueryPlan};
pub use state::{AgentAnswer, AgentRunState, AnswerMetadata, Stage, Strategy};
