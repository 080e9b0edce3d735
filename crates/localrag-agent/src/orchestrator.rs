//! The reasoning loop.
//!
//! ```text
//! ANALYZE -> RETRIEVE_SIMPLE ---------------------------> GENERATE -> REFLECT -> DONE
//!         \-> DECOMPOSE -> MULTI_RETRIEVE -> SYNTHESIZE -/    ^            |
//!                                                             \-- retry --/
//! ```
//!
//! Generation attempts are capped at `max_retries + 1`. Cancellation is
//! checked before every stage and after every awaited call; a result that
//! arrives after cancellation is dropped.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use localrag_core::config::{AgentMode, AgentSettings};
use localrag_core::error::{Error, Result};
use localrag_core::traits::{Completion, EvidenceRetriever};
use localrag_core::types::{Degradation, FusedResult, RetrievalContext};
use localrag_core::CancellationToken;

use crate::critic::{ReflectionCritic, ReflectionVerdict};
use crate::generator::AnswerGenerator;
use crate::plan::QueryAnalyzer;
use crate::state::{AgentAnswer, AgentRunState, Stage, Strategy};

pub struct Orchestrator {
    retriever: Arc<dyn EvidenceRetriever>,
    analyzer: QueryAnalyzer,
    generator: AnswerGenerator,
    critic: ReflectionCritic,
    settings: AgentSettings,
    top_k: usize,
}

impl Orchestrator {
    pub fn new(
        retriever: Arc<dyn EvidenceRetriever>,
        analyzer: QueryAnalyzer,
        generator: AnswerGenerator,
        critic: ReflectionCritic,
        settings: AgentSettings,
        top_k: usize,
    ) -> Self {
        Self { retriever, analyzer, generator, critic, settings, top_k: top_k.max(1) }
    }

    /// Wire analyzer, generator and critic to one completion collaborator.
    pub fn from_settings(
        retriever: Arc<dyn EvidenceRetriever>,
        completion: Arc<dyn Completion>,
        settings: AgentSettings,
        top_k: usize,
    ) -> Self {
        let analyzer = QueryAnalyzer::from_settings(&settings, Arc::clone(&completion));
        let generator = AnswerGenerator::new(Arc::clone(&completion), settings.generation_max_tokens, settings.generation_timeout());
        let critic = ReflectionCritic::new(completion, settings.reflection_max_tokens, settings.reflection_timeout());
        Self::new(retriever, analyzer, generator, critic, settings, top_k)
    }

    pub async fn answer(&self, question: &str, cancel: &CancellationToken) -> Result<AgentAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidQuery("question is empty".into()));
        }
        let mut state = AgentRunState::new(question, self.settings.mode);
        info!(mode = ?self.settings.mode, "answering question");

        while state.stage != Stage::Done {
            let stage = state.stage;
            checkpoint(cancel, stage)?;
            state.trace.push(stage);
            info!(stage = stage.name(), attempt = state.attempts, "entering stage");
            match stage {
                Stage::Analyze => self.analyze(&mut state, cancel).await?,
                Stage::RetrieveSimple => self.retrieve_simple(&mut state, cancel).await?,
                Stage::Decompose => decompose(&mut state),
                Stage::MultiRetrieve => self.multi_retrieve(&mut state, cancel).await?,
                Stage::Synthesize => synthesize(&mut state),
                Stage::Generate => self.generate(&mut state, cancel).await?,
                Stage::Reflect => self.reflect(&mut state, cancel).await?,
                Stage::Done => {}
            }
        }
        state.trace.push(Stage::Done);
        info!(
            strategy = ?state.strategy,
            attempts = state.attempts,
            score = state.verdict.as_ref().map(|v| v.score),
            degradations = state.degradations.len(),
            "question answered"
        );
        Ok(state.into_answer())
    }

    async fn analyze(&self, state: &mut AgentRunState, cancel: &CancellationToken) -> Result<()> {
        let (plan, degradations) = self.analyzer.analyze(&state.question).await;
        checkpoint(cancel, Stage::Analyze)?;
        state.degradations.extend(degradations);
        let next = if plan.is_complex() { Stage::Decompose } else { Stage::RetrieveSimple };
        state.plan = Some(plan);
        state.enter(next);
        Ok(())
    }

    async fn retrieve_simple(&self, state: &mut AgentRunState, cancel: &CancellationToken) -> Result<()> {
        let outcome = self.retriever.search(&state.question, self.top_k).await?;
        checkpoint(cancel, Stage::RetrieveSimple)?;
        state.evidence = outcome.results;
        state.degradations.extend(outcome.degradations);
        state.context_limit = self.top_k;
        state.enter(Stage::Generate);
        Ok(())
    }

    async fn multi_retrieve(&self, state: &mut AgentRunState, cancel: &CancellationToken) -> Result<()> {
        let sub_questions = state.plan.as_ref().map(|p| p.sub_questions.clone()).unwrap_or_default();
        // join_all yields in input order, whatever order the searches finish in.
        let outcomes = join_all(sub_questions.iter().map(|q| self.retriever.search(q, self.top_k))).await;
        checkpoint(cancel, Stage::MultiRetrieve)?;
        for outcome in outcomes {
            let outcome = outcome?;
            state.degradations.extend(outcome.degradations);
            state.sub_evidence.push(outcome.results);
        }
        state.context_limit = self.top_k.saturating_mul(sub_questions.len().max(1));
        state.enter(Stage::Synthesize);
        Ok(())
    }

    async fn generate(&self, state: &mut AgentRunState, cancel: &CancellationToken) -> Result<()> {
        state.attempts += 1;
        if state.evidence.is_empty() && !state.degradations.contains(&Degradation::NoEvidence) {
            warn!("no evidence retrieved");
            state.degradations.push(Degradation::NoEvidence);
        }
        let context = RetrievalContext::new(state.evidence.clone(), state.context_limit);
        let draft = self.generator.generate(&state.question, context, state.guidance.as_deref()).await?;
        checkpoint(cancel, Stage::Generate)?;
        // An insufficient-evidence answer is final; reflecting on it cannot add evidence.
        let next = if state.strategy == Strategy::Naive || draft.evidence_empty { Stage::Done } else { Stage::Reflect };
        state.draft = Some(draft);
        state.enter(next);
        Ok(())
    }

    async fn reflect(&self, state: &mut AgentRunState, cancel: &CancellationToken) -> Result<()> {
        let (context, answer) = match &state.draft {
            Some(d) => (d.context.as_str(), d.answer.as_str()),
            None => ("", ""),
        };
        let parsed = self.critic.reflect(&state.question, context, answer).await?;
        checkpoint(cancel, Stage::Reflect)?;
        // An unparseable reflection counts as a pass.
        let unparsed = parsed.is_none();
        let verdict = parsed.unwrap_or_else(|| {
            warn!(attempt = state.attempts, "reflection unparseable; passing at neutral score");
            state.degradations.push(Degradation::ReflectionUnparsed { attempt: state.attempts });
            ReflectionVerdict::neutral()
        });
        let budget_left = state.attempts <= self.settings.max_retries;
        let retry = !unparsed && !verdict.passes(self.settings.quality_threshold) && budget_left;
        info!(score = verdict.score, threshold = self.settings.quality_threshold, retry, "reflection verdict");
        if retry {
            state.guidance = Some(verdict.critique.clone().unwrap_or_else(|| {
                format!("The previous answer scored {:.1} of 5. Make it more relevant, accurate and complete.", verdict.score)
            }));
            state.enter(Stage::Generate);
        } else {
            state.enter(Stage::Done);
        }
        state.verdict = Some(verdict);
        Ok(())
    }
}

fn decompose(state: &mut AgentRunState) {
    state.strategy = Strategy::Decompose;
    if let Some(plan) = &state.plan {
        info!(sub_questions = ?plan.sub_questions, "decomposed question");
    }
    state.enter(Stage::MultiRetrieve);
}

/// Concatenate per-sub-question evidence in plan order, first occurrence of a
/// chunk id wins. No re-ranking across sub-questions.
fn synthesize(state: &mut AgentRunState) {
    state.evidence = merge_in_order(std::mem::take(&mut state.sub_evidence));
    state.enter(Stage::Generate);
}

pub fn merge_in_order(per_question: Vec<Vec<FusedResult>>) -> Vec<FusedResult> {
    let mut seen = HashSet::new();
    per_question
        .into_iter()
        .flatten()
        .filter(|r| seen.insert(r.chunk.id.clone()))
        .collect()
}

fn checkpoint(cancel: &CancellationToken, stage: Stage) -> Result<()> {
    if cancel.is_cancelled() {
        warn!(stage = stage.name(), "run cancelled");
        return Err(Error::Cancelled { stage: stage.name() });
    }
    Ok(())
}
