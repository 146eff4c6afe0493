//! Answer-generation building blocks.
//!
//! Pure pieces of the question-answering step: prompt assembly, the
//! confidence heuristic, and citation extraction. The application crate
//! wires these to a [`crate::completion::CompletionProvider`] and a cache.
//!
//! Confidence blends the mean similarity of the packed context (weight 0.7)
//! with an answer-length factor (weight 0.3) that rises linearly from 10 to
//! 500 characters. Empty context contributes a mean of zero, so answers
//! produced without evidence always score below 0.5.

use crate::models::{Citation, ContextResult};

/// System-role instruction for the completion model.
pub const SYSTEM_PROMPT: &str = "You are a professional resume analysis assistant. Use the provided context to answer questions about resumes. Only make statements that are directly supported by the context. If you're not sure about something, say so. Always maintain professional tone and respect privacy.";

/// Sampling temperature for answer generation.
pub const ANSWER_TEMPERATURE: f32 = 0.3;
/// Response cap in model tokens for answer generation.
pub const ANSWER_MAX_TOKENS: u32 = 500;
/// Returned when the model produces no content.
pub const FALLBACK_ANSWER: &str = "Unable to generate answer";

/// Citation text cap in characters, ellipsis included.
const CITATION_MAX_LENGTH: usize = 200;

const MIN_ANSWER_LENGTH: f32 = 10.0;
const MAX_ANSWER_LENGTH: f32 = 500.0;

const WEIGHT_CONTEXT: f32 = 0.7;
const WEIGHT_LENGTH: f32 = 0.3;

/// Join packed passages into the context block, one blank line between them.
pub fn join_context(context: &[ContextResult]) -> String {
    context
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the user-role prompt from the query and the joined context.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "\nQuestion: {query}\n\nContext:\n{context}\n\nPlease provide a concise and accurate answer based solely on the information provided in the context above. If the context doesn't contain enough information to fully answer the question, please indicate what information is missing or uncertain.\n\nAnswer:"
    )
}

/// Heuristic confidence in `[0.0, 1.0]` for an answer given its context.
pub fn confidence_score(answer: &str, context: &[ContextResult]) -> f32 {
    let avg_context_score = if context.is_empty() {
        0.0
    } else {
        context.iter().map(|c| c.score).sum::<f32>() / context.len() as f32
    };

    let answer_length = answer.chars().count() as f32;
    let length_score = ((answer_length - MIN_ANSWER_LENGTH)
        / (MAX_ANSWER_LENGTH - MIN_ANSWER_LENGTH))
        .clamp(0.0, 1.0);

    (WEIGHT_CONTEXT * avg_context_score + WEIGHT_LENGTH * length_score).clamp(0.0, 1.0)
}

/// One citation per context passage, in context order.
pub fn build_citations(context: &[ContextResult]) -> Vec<Citation> {
    context
        .iter()
        .map(|c| Citation {
            text: truncate_citation(&c.text),
            document_id: c.document_id.clone(),
            score: c.score,
        })
        .collect()
}

/// Cap citation text at [`CITATION_MAX_LENGTH`] characters, ellipsis included.
fn truncate_citation(text: &str) -> String {
    if text.chars().count() <= CITATION_MAX_LENGTH {
        return text.to_string();
    }
    let kept: String = text.chars().take(CITATION_MAX_LENGTH - 3).collect();
    format!("{kept}...")
}
