//! Per-question working state and the answer record it resolves to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use localrag_core::config::AgentMode;
use localrag_core::types::{ChunkId, Degradation, FusedResult};

use crate::critic::ReflectionVerdict;
use crate::generator::Draft;
use crate::plan::QueryPlan;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Analyze,
    RetrieveSimple,
    Decompose,
    MultiRetrieve,
    Synthesize,
    Generate,
    Reflect,
    Done,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Analyze => "analyze",
            Stage::RetrieveSimple => "retrieve_simple",
            Stage::Decompose => "decompose",
            Stage::MultiRetrieve => "multi_retrieve",
            Stage::Synthesize => "synthesize",
            Stage::Generate => "generate",
            Stage::Reflect => "reflect",
            Stage::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One retrieval on the raw question.
    Simple,
    /// Per-sub-question retrieval merged in plan order.
    Decompose,
    /// Retrieve and generate once, no analysis or reflection.
    Naive,
}

/// Working state for one question, owned by a single orchestrator run.
#[derive(Debug)]
pub struct AgentRunState {
    pub question: String,
    pub stage: Stage,
    pub strategy: Strategy,
    pub plan: Option<QueryPlan>,
    /// Evidence per sub-question, in plan order, until synthesized.
    pub sub_evidence: Vec<Vec<FusedResult>>,
    pub evidence: Vec<FusedResult>,
    /// Size bound of the generation context. `top_k` on the direct path;
    /// `top_k` per sub-question after decomposition, so the merged union of
    /// every sub-question's evidence reaches the generator untruncated.
    pub context_limit: usize,
    pub attempts: usize,
    pub draft: Option<Draft>,
    pub verdict: Option<ReflectionVerdict>,
    pub guidance: Option<String>,
    pub degradations: Vec<Degradation>,
    pub trace: Vec<Stage>,
}

impl AgentRunState {
    pub fn new(question: &str, mode: AgentMode) -> Self {
        let (stage, strategy) = match mode {
            AgentMode::Agentic => (Stage::Analyze, Strategy::Simple),
            AgentMode::Naive => (Stage::RetrieveSimple, Strategy::Naive),
        };
        Self {
            question: question.to_string(),
            stage,
            strategy,
            plan: None,
            sub_evidence: Vec::new(),
            evidence: Vec::new(),
            context_limit: 0,
            attempts: 0,
            draft: None,
            verdict: None,
            guidance: None,
            degradations: Vec::new(),
            trace: Vec::new(),
        }
    }

    pub fn enter(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub fn into_answer(self) -> AgentAnswer {
        let draft = self.draft.unwrap_or_else(|| Draft {
            answer: crate::prompts::insufficient_evidence_answer(),
            citations: Vec::new(),
            context: String::new(),
            evidence_empty: true,
        });
        AgentAnswer {
            question: self.question,
            answer: draft.answer,
            citations: draft.citations,
            sources: self.evidence,
            metadata: AnswerMetadata {
                strategy: self.strategy,
                sub_questions: self.plan.map(|p| p.sub_questions).unwrap_or_default(),
                attempts: self.attempts,
                final_score: self.verdict.as_ref().map(|v| v.score),
                critique: self.verdict.and_then(|v| v.critique),
                degradations: self.degradations,
                stages: self.trace,
            },
            answered_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerMetadata {
    pub strategy: Strategy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_questions: Vec<String>,
    /// Generation attempts made, including retries.
    pub attempts: usize,
    pub final_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critique: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
    pub stages: Vec<Stage>,
}

/// Final, serializable result of one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentAnswer {
    pub question: String,
    pub answer: String,
    pub citations: Vec<ChunkId>,
    pub sources: Vec<FusedResult>,
    pub metadata: AnswerMetadata,
    pub answered_at: DateTime<Utc>,
}

impl AgentAnswer {
    /// Whether any part of the run fell back to a best-effort path.
    pub fn is_degraded(&self) -> bool {
        !self.metadata.degradations.is_empty() || self.sources.iter().any(|s| s.degraded)
    }
}
