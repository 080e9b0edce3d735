//! Prompt templates and evidence formatting.

use localrag_core::types::FusedResult;

/// Leading text of every answer produced without evidence.
pub const INSUFFICIENT_EVIDENCE: &str = "Insufficient evidence";

pub fn insufficient_evidence_answer() -> String {
    format!("{INSUFFICIENT_EVIDENCE}: the indexed documents contain nothing that answers this question.")
}

pub const ANSWER_SYSTEM: &str = "You answer questions using only the numbered context blocks you are given.
Rules:
1. State only facts supported by the context.
2. Cite every fact with the block marker it came from, e.g. [1] or [2].
3. Mention page numbers when the context provides them.
4. If the context does not contain the answer, reply exactly with \"Insufficient evidence\" and a one-line reason.";

pub const ANALYZER_SYSTEM: &str = "You are a query analysis agent. You decide whether a question can be answered with a single search or must be split into sub-questions. Reply with JSON only.";

pub const REFLECTION_SYSTEM: &str = "You are an answer quality reviewer. You compare an answer with its question and evidence and reply with JSON only.";

/// Numbered context blocks: `[n] source: <file> (p.<page>)` followed by the text.
pub fn format_context<'a>(results: impl IntoIterator<Item = &'a FusedResult>) -> String {
    let mut blocks = Vec::new();
    for (i, r) in results.into_iter().enumerate() {
        let page = r.chunk.page.map(|p| format!(" (p.{p})")).unwrap_or_default();
        blocks.push(format!("[{}] source: {}{}\n{}", i + 1, r.chunk.source, page, r.chunk.content));
    }
    blocks.join("\n\n")
}

pub fn answer_prompt(question: &str, context: &str, guidance: Option<&str>) -> String {
    let mut prompt = format!("## Context\n{context}\n\n## Question\n{question}\n");
    if let Some(guidance) = guidance.filter(|g| !g.trim().is_empty()) {
        prompt.push_str(&format!(
            "\n## Reviewer feedback on the previous answer\n{guidance}\nAddress this feedback in the new answer.\n"
        ));
    }
    prompt.push_str("\n## Answer\n");
    prompt
}

pub fn analysis_prompt(question: &str, max_sub_questions: usize) -> String {
    format!(
        r#"## Question
{question}

Classify the question:
- "simple": one search can answer it
- "complex": it combines several facts that need separate searches

Reply with JSON:
{{
  "query_type": "simple" or "complex",
  "reasoning": "why",
  "sub_queries": ["self-contained sub-question", "..."]
}}
Use between 2 and {max_sub_questions} sub_queries for "complex", none for "simple"."#
    )
}

pub fn reflection_prompt(question: &str, context: &str, answer: &str) -> String {
    format!(
        r#"## Question
{question}

## Context
{context}

## Answer
{answer}

Rate the answer from 1 to 5 on each axis and reply with JSON:
{{
  "relevance": 1-5,
  "accuracy": 1-5,
  "completeness": 1-5,
  "needs_improvement": true or false,
  "improvement_suggestions": "concrete changes, empty if none"
}}"#
    )
}

/// Slice out the outermost JSON object from model output that may be fenced
/// or wrapped in prose.
pub(crate) fn json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
