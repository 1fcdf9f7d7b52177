//! Prompt assembly for the build-context stage.
//!
//! A prompt is a fixed template with three placeholders:
//!
//! | Placeholder | Filled with |
//! |-------------|-------------|
//! | `{prev_conversation}` | Rendered session history, one `User:` / `Assistant:` line per turn |
//! | `{sources}` | One `[id] <snippet>...` line per retrieved passage |
//! | `{query}` | The normalized user query |
//!
//! Substitution is a single left-to-right pass, so placeholder-like text
//! inside user input or passages is copied verbatim rather than expanded.

use crate::error::PipelineError;
use crate::models::{Passage, Turn};

/// System instruction sent with every generation request.
pub const SYSTEM_INSTRUCTION: &str = "You are an assistant.";

/// Answer substituted when the generator fails.
pub const FALLBACK_ANSWER: &str = "Sorry, I couldn't get a response from the LLM at this time.";

/// Default user prompt template.
pub const DEFAULT_TEMPLATE: &str = "You are an assistant knowledgeable in Karnataka agriculture schemes.\n\
Conversation so far:\n{prev_conversation}\n\n\
Here are relevant document excerpts (with ids):\n{sources}\n\
User question: {query}\n\n\
Answer clearly, cite using [id]. If unsure, say you cannot find authoritative source and suggest next steps.";

const PREV_CONVERSATION: &str = "{prev_conversation}";
const SOURCES: &str = "{sources}";
const QUERY: &str = "{query}";

/// A validated prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Build a template, rejecting text that lacks any required placeholder.
    pub fn new(text: impl Into<String>) -> Result<Self, PipelineError> {
        let text = text.into();
        for placeholder in [PREV_CONVERSATION, SOURCES, QUERY] {
            if !text.contains(placeholder) {
                return Err(PipelineError::TemplateError(format!(
                    "template is missing the {} placeholder",
                    placeholder
                )));
            }
        }
        Ok(Self { text })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Fill the placeholders.
    pub fn render(&self, prev_conversation: &str, sources: &str, query: &str) -> String {
        let mut out = String::with_capacity(
            self.text.len() + prev_conversation.len() + sources.len() + query.len(),
        );
        let mut rest = self.text.as_str();

        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            let (value, consumed) = if tail.starts_with(PREV_CONVERSATION) {
                (prev_conversation, PREV_CONVERSATION.len())
            } else if tail.starts_with(SOURCES) {
                (sources, SOURCES.len())
            } else if tail.starts_with(QUERY) {
                (query, QUERY.len())
            } else {
                ("{", 1)
            };
            out.push_str(value);
            rest = &tail[consumed..];
        }
        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Render history as alternating `User:` / `Assistant:` lines.
pub fn render_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First `max_chars` characters of `text` with newlines flattened to spaces.
pub fn snippet(text: &str, max_chars: usize) -> String {
    text.chars()
        .take(max_chars)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect()
}

/// Render the source block: one `[id] <snippet>...` line per passage.
pub fn render_sources(passages: &[Passage], max_chars: usize) -> String {
    let mut out = String::new();
    for passage in passages {
        out.push('[');
        out.push_str(&passage.id);
        out.push_str("] ");
        out.push_str(&snippet(&passage.text, max_chars));
        out.push_str("...\n");
    }
    out
}
