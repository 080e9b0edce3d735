//! Reflection critic: scores a draft answer on a 1-5 scale.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use localrag_core::error::{Error, Result};
use localrag_core::traits::Completion;

use crate::prompts::{json_object, reflection_prompt, REFLECTION_SYSTEM};

pub const MIN_SCORE: f32 = 1.0;
pub const MAX_SCORE: f32 = 5.0;
/// Score given to a draft whose reflection could not be parsed.
pub const NEUTRAL_SCORE: f32 = 3.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReflectionVerdict {
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critique: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_improvement: Option<bool>,
}

impl ReflectionVerdict {
    pub fn neutral() -> Self {
        Self { score: NEUTRAL_SCORE, critique: None, needs_improvement: None }
    }

    pub fn passes(&self, threshold: f32) -> bool {
        self.score >= threshold
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawVerdict {
    score: Option<f32>,
    relevance: Option<f32>,
    accuracy: Option<f32>,
    completeness: Option<f32>,
    needs_improvement: Option<bool>,
    #[serde(alias = "critique", alias = "feedback")]
    improvement_suggestions: Option<String>,
}

/// Parse a critic reply. Accepts three-axis JSON (score is the mean of the
/// axes present), a single JSON `score`, or a plain `Score: N` line.
/// Scores are clamped to 1-5. `None` when no score can be found.
pub fn parse_verdict(text: &str) -> Option<ReflectionVerdict> {
    if let Some(raw) = json_object(text).and_then(|j| serde_json::from_str::<RawVerdict>(j).ok()) {
        let axes: Vec<f32> = [raw.relevance, raw.accuracy, raw.completeness].into_iter().flatten().collect();
        let score = if axes.is_empty() { raw.score } else { Some(axes.iter().sum::<f32>() / axes.len() as f32) };
        if let Some(score) = score.filter(|s| s.is_finite()) {
            let critique = raw.improvement_suggestions.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
            return Some(ReflectionVerdict {
                score: score.clamp(MIN_SCORE, MAX_SCORE),
                critique,
                needs_improvement: raw.needs_improvement,
            });
        }
    }
    plain_score(text).map(|score| ReflectionVerdict {
        score: score.clamp(MIN_SCORE, MAX_SCORE),
        critique: critique_after_score(text),
        needs_improvement: None,
    })
}

fn plain_score(text: &str) -> Option<f32> {
    let lower = text.to_lowercase();
    let at = lower.find("score")? + "score".len();
    let rest = lower[at..].trim_start_matches(|c: char| c == ':' || c == '=' || c.is_whitespace());
    let number: String = rest.chars().take_while(|c| c.is_ascii_digit() || *c == '.').collect();
    number.trim_end_matches('.').parse().ok().filter(|s: &f32| s.is_finite())
}

fn critique_after_score(text: &str) -> Option<String> {
    let rest: Vec<&str> = text.lines().skip_while(|l| !l.to_lowercase().contains("score")).skip(1).collect();
    let critique = rest.join("\n").trim().to_string();
    (!critique.is_empty()).then_some(critique)
}

pub struct ReflectionCritic {
    completion: Arc<dyn Completion>,
    max_tokens: usize,
    timeout: Duration,
}

impl ReflectionCritic {
    pub fn new(completion: Arc<dyn Completion>, max_tokens: usize, timeout: Duration) -> Self {
        Self { completion, max_tokens, timeout }
    }

    /// `Ok(None)` when the reply carries no usable score; collaborator
    /// failures and timeouts are errors.
    pub async fn reflect(&self, question: &str, context: &str, answer: &str) -> Result<Option<ReflectionVerdict>> {
        let prompt = reflection_prompt(question, context, answer);
        let reply = tokio::time::timeout(self.timeout, self.completion.complete(&prompt, REFLECTION_SYSTEM, self.max_tokens))
            .await
            .map_err(|_| Error::Timeout { stage: "reflect", after: self.timeout })?
            .map_err(|e| Error::Completion { stage: "reflect", reason: format!("{e:#}") })?;
        let verdict = parse_verdict(&reply);
        debug!(score = verdict.as_ref().map(|v| v.score), "reflection parsed");
        Ok(verdict)
    }
}
