//! Answer generation over a retrieval context, with citation extraction.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use localrag_core::error::{Error, Result};
use localrag_core::traits::Completion;
use localrag_core::types::{ChunkId, RetrievalContext};

use crate::prompts::{answer_prompt, format_context, insufficient_evidence_answer, ANSWER_SYSTEM};

/// One generation attempt's output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Draft {
    pub answer: String,
    /// Chunk ids the answer actually references, in order of first mention.
    pub citations: Vec<ChunkId>,
    /// The formatted evidence the answer was generated from.
    #[serde(skip)]
    pub context: String,
    pub evidence_empty: bool,
}

pub struct AnswerGenerator {
    completion: Arc<dyn Completion>,
    max_tokens: usize,
    timeout: Duration,
}

impl AnswerGenerator {
    pub fn new(completion: Arc<dyn Completion>, max_tokens: usize, timeout: Duration) -> Self {
        Self { completion, max_tokens, timeout }
    }

    /// Consumes `context`. With no evidence the completion collaborator is not
    /// called and an explicit insufficient-evidence answer is returned.
    pub async fn generate(&self, question: &str, context: RetrievalContext, guidance: Option<&str>) -> Result<Draft> {
        if context.is_empty() {
            info!("no evidence; answering with insufficient-evidence marker");
            return Ok(Draft { answer: insufficient_evidence_answer(), citations: Vec::new(), context: String::new(), evidence_empty: true });
        }
        let ids: Vec<ChunkId> = context.iter().map(|r| r.chunk.id.clone()).collect();
        let context_text = format_context(context.iter());
        drop(context);

        let prompt = answer_prompt(question, &context_text, guidance);
        let answer = tokio::time::timeout(self.timeout, self.completion.complete(&prompt, ANSWER_SYSTEM, self.max_tokens))
            .await
            .map_err(|_| Error::Timeout { stage: "generate", after: self.timeout })?
            .map_err(|e| Error::Completion { stage: "generate", reason: format!("{e:#}") })?;
        let citations = extract_citations(&answer, &ids);
        debug!(evidence = ids.len(), citations = citations.len(), "draft generated");
        Ok(Draft { answer, citations, context: context_text, evidence_empty: false })
    }
}

/// Map `[n]` markers (also `[1, 3]`) and literal chunk ids in `answer` back to
/// chunk ids, ordered by first appearance and deduplicated.
pub fn extract_citations(answer: &str, ids: &[ChunkId]) -> Vec<ChunkId> {
    let mut found: Vec<(usize, usize)> = Vec::new();

    let mut i = 0;
    while let Some(open) = answer[i..].find('[').map(|o| o + i) {
        let Some(close) = answer[open + 1..].find(']').map(|c| c + open + 1) else { break };
        let inner = &answer[open + 1..close];
        if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit() || b == b',' || b == b' ') {
            for n in inner.split(',').filter_map(|n| n.trim().parse::<usize>().ok()) {
                if (1..=ids.len()).contains(&n) {
                    found.push((open, n - 1));
                }
            }
        }
        i = open + 1;
    }

    for (idx, id) in ids.iter().enumerate() {
        if let Some(pos) = find_standalone(answer, id) {
            found.push((pos, idx));
        }
    }

    found.sort_by_key(|&(pos, _)| pos);
    let mut citations: Vec<ChunkId> = Vec::new();
    for (_, idx) in found {
        if !citations.contains(&ids[idx]) {
            citations.push(ids[idx].clone());
        }
    }
    citations
}

/// First occurrence of `id` not embedded in a longer identifier.
fn find_standalone(text: &str, id: &str) -> Option<usize> {
    if id.is_empty() {
        return None;
    }
    let is_id_char = |c: char| c.is_alphanumeric() || matches!(c, ':' | '_' | '-' | '/');
    text.match_indices(id).map(|(pos, _)| pos).find(|&pos| {
        let before = text[..pos].chars().next_back();
        let after = text[pos + id.len()..].chars().next();
        !before.is_some_and(is_id_char) && !after.is_some_and(is_id_char)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<ChunkId> {
        vec!["survey:p12:0".into(), "survey:p13:0".into(), "stove:p4:0".into()]
    }

    #[test]
    fn markers_map_to_chunk_ids_in_order() {
        let cites = extract_citations("The rate was 89.2% [2]. Premiums rose [1][2].", &ids());
        assert_eq!(cites, vec!["survey:p13:0", "survey:p12:0"]);
    }

    #[test]
    fn grouped_markers_and_literal_ids() {
        let cites = extract_citations("See stove:p4:0 and [1, 2].", &ids());
        assert_eq!(cites, vec!["stove:p4:0", "survey:p12:0", "survey:p13:0"]);
    }

    #[test]
    fn short_ids_need_boundaries() {
        let ids: Vec<ChunkId> = vec!["a".into(), "p4".into()];
        assert!(extract_citations("A rate was reported at page p45.", &ids).is_empty());
        assert_eq!(extract_citations("Both (a) and p4. agree", &ids), vec!["a", "p4"]);
        assert_eq!(extract_citations("stove:p4:0 only", &self::ids()), vec!["stove:p4:0"]);
    }

    #[test]
    fn out_of_range_and_non_numeric_brackets_are_ignored() {
        assert!(extract_citations("[0] [4] [note] [", &ids()).is_empty());
        assert!(extract_citations("no citations here", &ids()).is_empty());
    }
}
