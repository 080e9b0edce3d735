#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use localrag_agent::prompts::{ANALYZER_SYSTEM, ANSWER_SYSTEM, REFLECTION_SYSTEM};
use localrag_core::error::Result;
use localrag_core::traits::{Completion, EvidenceRetriever};
use localrag_core::types::{Chunk, FusedResult, Provenance, RerankStatus, RetrievalOutcome};
use localrag_core::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Analyze,
    Answer,
    Reflect,
}

/// Completion fake that replays queued replies per call kind and records prompts.
#[derive(Default)]
pub struct ScriptedCompletion {
    analysis: Mutex<VecDeque<String>>,
    answers: Mutex<VecDeque<String>>,
    reflections: Mutex<VecDeque<String>>,
    pub calls: Mutex<Vec<(Call, String)>>,
    /// 1-based answer call from which every answer call fails.
    pub fail_answers_from: Option<usize>,
    pub answer_delay: Option<Duration>,
    pub fail_reflections: bool,
    pub reflection_delay: Option<Duration>,
    /// Cancel this token when a call of the given kind is made.
    pub cancel_on: Option<(Call, CancellationToken)>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analysis(self, reply: &str) -> Self {
        self.analysis.lock().unwrap().push_back(reply.to_string());
        self
    }

    pub fn answer(self, reply: &str) -> Self {
        self.answers.lock().unwrap().push_back(reply.to_string());
        self
    }

    pub fn reflection(self, reply: &str) -> Self {
        self.reflections.lock().unwrap().push_back(reply.to_string());
        self
    }

    pub fn failing_answers(self) -> Self {
        self.failing_answers_from(1)
    }

    pub fn failing_answers_from(mut self, call: usize) -> Self {
        self.fail_answers_from = Some(call);
        self
    }

    pub fn failing_reflections(mut self) -> Self {
        self.fail_reflections = true;
        self
    }

    pub fn slow_reflections(mut self, delay: Duration) -> Self {
        self.reflection_delay = Some(delay);
        self
    }

    pub fn cancelling_on(mut self, kind: Call, token: CancellationToken) -> Self {
        self.cancel_on = Some((kind, token));
        self
    }

    pub fn slow_answers(mut self, delay: Duration) -> Self {
        self.answer_delay = Some(delay);
        self
    }

    pub fn prompts(&self, kind: Call) -> Vec<String> {
        self.calls.lock().unwrap().iter().filter(|(k, _)| *k == kind).map(|(_, p)| p.clone()).collect()
    }
}

#[async_trait]
impl Completion for ScriptedCompletion {
    async fn complete(&self, prompt: &str, system_instructions: &str, _max_tokens: usize) -> anyhow::Result<String> {
        let kind = if system_instructions == ANALYZER_SYSTEM {
            Call::Analyze
        } else if system_instructions == ANSWER_SYSTEM {
            Call::Answer
        } else if system_instructions == REFLECTION_SYSTEM {
            Call::Reflect
        } else {
            anyhow::bail!("unexpected system instructions");
        };
        let nth = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((kind, prompt.to_string()));
            calls.iter().filter(|(k, _)| *k == kind).count()
        };
        if let Some((on, token)) = &self.cancel_on {
            if *on == kind {
                token.cancel();
            }
        }
        match kind {
            Call::Analyze => Ok(self.analysis.lock().unwrap().pop_front().unwrap_or_else(|| "no idea".into())),
            Call::Answer => {
                if let Some(d) = self.answer_delay {
                    tokio::time::sleep(d).await;
                }
                if self.fail_answers_from.is_some_and(|from| nth >= from) {
                    anyhow::bail!("model overloaded");
                }
                Ok(self.answers.lock().unwrap().pop_front().unwrap_or_else(|| "default answer [1]".into()))
            }
            Call::Reflect => {
                if let Some(d) = self.reflection_delay {
                    tokio::time::sleep(d).await;
                }
                if self.fail_reflections {
                    anyhow::bail!("reviewer model unavailable");
                }
                Ok(self.reflections.lock().unwrap().pop_front().unwrap_or_else(|| r#"{"score": 1}"#.into()))
            }
        }
    }
}

pub fn fused(id: &str, score: f64) -> FusedResult {
    FusedResult {
        chunk: Chunk::new(id, id.split(':').next().unwrap_or(id), format!("{}.pdf", id.split(':').next().unwrap_or(id)), format!("content of {id}")),
        score,
        provenance: Provenance::default(),
        degraded: false,
        rerank: RerankStatus::NotRequested,
    }
}

/// Evidence retriever returning canned results per query.
#[derive(Default)]
pub struct FakeRetriever {
    pub by_query: HashMap<String, Vec<FusedResult>>,
    pub delays: HashMap<String, Duration>,
    pub default: Vec<FusedResult>,
    pub cancel_on_call: Option<CancellationToken>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeRetriever {
    pub fn returning(results: Vec<FusedResult>) -> Self {
        Self { default: results, ..Self::default() }
    }

    pub fn with(mut self, query: &str, results: Vec<FusedResult>) -> Self {
        self.by_query.insert(query.to_string(), results);
        self
    }

    pub fn delayed(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }
}

#[async_trait]
impl EvidenceRetriever for FakeRetriever {
    async fn search(&self, query: &str, top_k: usize) -> Result<RetrievalOutcome> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(d) = self.delays.get(query) {
            tokio::time::sleep(*d).await;
        }
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }
        let mut results = self.by_query.get(query).cloned().unwrap_or_else(|| self.default.clone());
        results.truncate(top_k);
        Ok(RetrievalOutcome { results, degradations: Vec::new() })
    }
}
