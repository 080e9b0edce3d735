//! Query analysis: decide between one direct retrieval and decomposition.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use localrag_core::config::{AgentSettings, AnalyzerKind};
use localrag_core::traits::Completion;
use localrag_core::types::Degradation;

use crate::prompts::{analysis_prompt, json_object, ANALYZER_SYSTEM};

const ANALYSIS_MAX_TOKENS: usize = 512;

const MULTI_PART_SIGNALS: &[&str] = &[
    "compare", "comparison", "difference between", "differ", "versus", " vs ", "relationship between",
    "why", "because", "cause", "impact of", "effect of", "affect", "both",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Complex,
}

/// Analyzer output. `sub_questions` is empty for `Simple` and never longer
/// than the configured bound.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryPlan {
    pub complexity: Complexity,
    pub sub_questions: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reasoning: String,
}

impl QueryPlan {
    pub fn simple(reasoning: impl Into<String>) -> Self {
        Self { complexity: Complexity::Simple, sub_questions: Vec::new(), reasoning: reasoning.into() }
    }

    pub fn is_complex(&self) -> bool {
        self.complexity == Complexity::Complex
    }

    /// Enforce the sub-question bound; a complex plan left without
    /// sub-questions becomes simple.
    fn bounded(mut self, max: usize, degradations: &mut Vec<Degradation>) -> Self {
        self.sub_questions.retain(|q| !q.trim().is_empty());
        if self.sub_questions.len() > max {
            warn!(proposed = self.sub_questions.len(), kept = max, "plan truncated");
            degradations.push(Degradation::PlanTruncated { proposed: self.sub_questions.len(), kept: max });
            self.sub_questions.truncate(max);
        }
        if self.complexity == Complexity::Simple {
            self.sub_questions.clear();
        } else if self.sub_questions.is_empty() {
            self.complexity = Complexity::Simple;
        }
        self
    }
}

/// Rubric-based classification: several question segments, or comparison and
/// causal language joining clauses with "and", mean `Complex`. Anything
/// ambiguous is `Simple`.
pub fn heuristic_plan(question: &str) -> QueryPlan {
    let q = question.trim();
    let segments: Vec<String> = q
        .split(['?', ';', '？'])
        .map(str::trim)
        .filter(|s| s.split_whitespace().count() >= 2)
        .map(|s| format!("{s}?"))
        .collect();
    if segments.len() >= 2 {
        return QueryPlan { complexity: Complexity::Complex, sub_questions: segments, reasoning: "several questions asked".into() };
    }

    let lower = format!(" {} ", q.to_lowercase());
    if MULTI_PART_SIGNALS.iter().any(|s| lower.contains(s)) {
        let body = q.trim_end_matches(['?', '.', '？']);
        let parts: Vec<String> = body
            .split(" and ")
            .map(str::trim)
            .filter(|p| p.split_whitespace().count() >= 2)
            .map(|p| format!("{p}?"))
            .collect();
        if parts.len() >= 2 {
            return QueryPlan { complexity: Complexity::Complex, sub_questions: parts, reasoning: "comparison or causal question".into() };
        }
    }
    QueryPlan::simple("single fact lookup")
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    query_type: String,
    #[serde(default)]
    sub_queries: Vec<String>,
    #[serde(default)]
    reasoning: String,
}

/// Parse the analysis model's JSON reply. `None` when the reply is unusable.
pub fn parse_plan(text: &str) -> Option<QueryPlan> {
    let raw: RawPlan = serde_json::from_str(json_object(text)?).ok()?;
    let complexity = match raw.query_type.trim().to_lowercase().as_str() {
        "simple" => Complexity::Simple,
        "complex" => Complexity::Complex,
        _ => return None,
    };
    Some(QueryPlan { complexity, sub_questions: raw.sub_queries, reasoning: raw.reasoning })
}

pub struct QueryAnalyzer {
    kind: AnalyzerKind,
    completion: Option<Arc<dyn Completion>>,
    max_sub_questions: usize,
    timeout: Duration,
}

impl QueryAnalyzer {
    pub fn heuristic(max_sub_questions: usize) -> Self {
        Self { kind: AnalyzerKind::Heuristic, completion: None, max_sub_questions, timeout: Duration::ZERO }
    }

    pub fn from_settings(settings: &AgentSettings, completion: Arc<dyn Completion>) -> Self {
        Self {
            kind: settings.analyzer,
            completion: Some(completion),
            max_sub_questions: settings.max_sub_questions.max(1),
            timeout: settings.analysis_timeout(),
        }
    }

    /// Never fails: an unusable model reply falls back to a simple plan.
    pub async fn analyze(&self, question: &str) -> (QueryPlan, Vec<Degradation>) {
        let mut degradations = Vec::new();
        let plan = match (self.kind, &self.completion) {
            (AnalyzerKind::Llm, Some(completion)) => match self.ask_model(completion.as_ref(), question).await {
                Ok(plan) => plan,
                Err(reason) => {
                    warn!(%reason, "query analysis failed; defaulting to simple");
                    degradations.push(Degradation::AnalyzerFallback { reason });
                    QueryPlan::simple("analysis fallback")
                }
            },
            _ => heuristic_plan(question),
        };
        let plan = plan.bounded(self.max_sub_questions, &mut degradations);
        debug!(complexity = ?plan.complexity, sub_questions = plan.sub_questions.len(), "query analyzed");
        (plan, degradations)
    }

    async fn ask_model(&self, completion: &dyn Completion, question: &str) -> Result<QueryPlan, String> {
        let prompt = analysis_prompt(question, self.max_sub_questions);
        let reply = tokio::time::timeout(self.timeout, completion.complete(&prompt, ANALYZER_SYSTEM, ANALYSIS_MAX_TOKENS))
            .await
            .map_err(|_| format!("timed out after {:?}", self.timeout))?
            .map_err(|e| format!("{e:#}"))?;
        parse_plan(&reply).ok_or_else(|| "unparseable analysis reply".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_fact_question_is_simple() {
        let plan = heuristic_plan("What is the household enrollment rate for life insurance?");
        assert_eq!(plan.complexity, Complexity::Simple);
        assert!(plan.sub_questions.is_empty());
    }

    #[test]
    fn several_questions_are_split() {
        let plan = heuristic_plan("What was the 2021 enrollment rate? What was it in 2018?");
        assert!(plan.is_complex());
        assert_eq!(plan.sub_questions, vec!["What was the 2021 enrollment rate?", "What was it in 2018?"]);
    }

    #[test]
    fn comparison_joined_by_and_is_complex() {
        let plan = heuristic_plan("Compare the life insurance enrollment rate and the average annual premium");
        assert!(plan.is_complex());
        assert_eq!(plan.sub_questions.len(), 2);
    }

    #[test]
    fn and_without_signal_stays_simple() {
        let plan = heuristic_plan("List the tables and figures in the survey");
        assert_eq!(plan.complexity, Complexity::Simple);
    }

    #[test]
    fn parse_plan_accepts_fenced_json() {
        let reply = "```json\n{\"query_type\": \"complex\", \"reasoning\": \"two years\", \"sub_queries\": [\"rate 2021\", \"rate 2018\"]}\n```";
        let plan = parse_plan(reply).unwrap();
        assert!(plan.is_complex());
        assert_eq!(plan.sub_questions.len(), 2);
        assert!(parse_plan("{\"query_type\": \"maybe\"}").is_none());
        assert!(parse_plan("simple").is_none());
    }

    #[test]
    fn bounded_truncates_and_demotes() {
        let mut degradations = Vec::new();
        let plan = QueryPlan { complexity: Complexity::Complex, sub_questions: (0..8).map(|i| format!("q{i}")).collect(), reasoning: String::new() }
            .bounded(5, &mut degradations);
        assert_eq!(plan.sub_questions.len(), 5);
        assert_eq!(degradations, vec![Degradation::PlanTruncated { proposed: 8, kept: 5 }]);

        let empty = QueryPlan { complexity: Complexity::Complex, sub_questions: vec!["  ".into()], reasoning: String::new() }
            .bounded(5, &mut degradations);
        assert_eq!(empty.complexity, Complexity::Simple);
    }
}
