//! Prompt templates for grounded extraction.

use super::validate::SENTINEL_ANSWER;

/// System instructions for grounded extraction.
pub fn system_prompt() -> String {
    format!(
        "You are an insurance policy analyst. Answer strictly from the passages supplied by the \
         user.\n\
         Rules:\n\
         1. Use only facts stated in the passages.\n\
         2. Reply in one or two short sentences with the exact figures, durations and conditions.\n\
         3. If the passages do not contain the answer, reply exactly: \"{SENTINEL_ANSWER}\"\n\
         4. Do not hedge, speculate, describe industry practice, or give recommendations.\n\
         5. Never mention passage labels, page numbers, or the word \"passage\"."
    )
}

/// User message carrying the context and the original question.
pub fn user_prompt(context: &str, question: &str) -> String {
    format!(
        "Passages:\n{context}\n\nQuestion: {}\n\nAnswer:",
        question.trim()
    )
}
