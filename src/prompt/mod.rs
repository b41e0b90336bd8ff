//! Critique prompt rendering.
//!
//! Pure functions from a transcript to text. The same transcript and label
//! always render the same bytes.

use std::fmt::Write;

use crate::llm::{ChatRequest, Message};
use crate::transcript::{Transcript, Turn};

/// Render every turn as `Role: content`, or as separate content and
/// reasoning lines when the turn carries reasoning.
pub fn render_history(turns: &[Turn]) -> String {
    let mut out = String::new();
    for turn in turns {
        let label = turn.role.label();
        match turn.reasoning() {
            Some(reasoning) => {
                let _ = write!(
                    out,
                    "{}:\nContent: {}\nReasoning: {}\n\n",
                    label, turn.content, reasoning
                );
            }
            None => {
                let _ = write!(out, "{}: {}\n\n", label, turn.content);
            }
        }
    }
    out
}

/// Build the single instruction a critic model receives
pub fn build_critique_prompt(transcript: &Transcript, critique_type: &str) -> String {
    let history = render_history(transcript.turns());

    format!(
        "You are acting as a {kind} AI, reviewing a conversation between a User and an AI assistant.\n\
         Your task is to provide a {kind} of the AI assistant's responses and reasoning in the context of the conversation so far.\n\
         \n\
         --- Conversation History ---\n\
         {history}\
         --- End of Conversation History ---\n\
         \n\
         Provide your {kind} of the AI assistant's turns in the conversation above. \
         Focus on the most recent assistant response and its reasoning, but consider the entire conversation for context.\n\
         \n\
         Your {kind}:\n",
        kind = critique_type,
        history = history,
    )
}

/// The rendered prompt as the sole user message of a request to `model`
pub fn build_critique_request(
    transcript: &Transcript,
    critique_type: &str,
    model: &str,
    include_reasoning: bool,
) -> ChatRequest {
    ChatRequest::new(model, vec![Message::user(build_critique_prompt(transcript, critique_type))])
        .with_reasoning(include_reasoning)
}
