//! Answer generation capability.

use anyhow::Result;
use async_trait::async_trait;

/// A chat-completion backend.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier for logs (e.g. `"llama3.1:8b"`).
    fn model_name(&self) -> &str;

    /// Produce an answer for `prompt` under `system_instruction`.
    async fn complete(&self, system_instruction: &str, prompt: &str) -> Result<String>;
}

/// Outcome of the generate stage.
///
/// A generator failure does not abort the run. It becomes
/// [`Generation::Degraded`], carrying the fallback text the user receives
/// and the cause for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Ok(String),
    Degraded { fallback: String, cause: String },
}

impl Generation {
    /// The answer text the user will see.
    pub fn text(&self) -> &str {
        match self {
            Generation::Ok(text) => text,
            Generation::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Generation::Degraded { .. })
    }

    /// Failure cause, if degraded.
    pub fn cause(&self) -> Option<&str> {
        match self {
            Generation::Ok(_) => None,
            Generation::Degraded { cause, .. } => Some(cause),
        }
    }
}
