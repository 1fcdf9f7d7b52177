//! Error taxonomy for a pipeline run.
//!
//! Only fatal conditions are errors. A failed generation is a tagged
//! [`Generation::Degraded`](crate::generator::Generation::Degraded) value and
//! a failed audit write is a [`LogWriteError`] that the finalize stage
//! absorbs; neither aborts the run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required capability (retriever or generator) is not configured.
    #[error("{0} is not configured")]
    MissingCollaborator(String),

    /// A continuation referenced a session id the registry does not hold.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The retriever returned an error. No memory mutation has happened.
    #[error("retrieval failed: {0}")]
    RetrievalFailed(String),

    /// A prompt field or template placeholder was structurally absent.
    #[error("prompt template error: {0}")]
    TemplateError(String),

    /// An external call exceeded its deadline.
    #[error("{stage} stage timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },
}

impl PipelineError {
    /// Recover a `PipelineError` carried inside an `anyhow::Error`, or wrap
    /// any other retriever failure as [`PipelineError::RetrievalFailed`].
    pub fn from_retrieval(err: anyhow::Error) -> Self {
        match err.downcast::<PipelineError>() {
            Ok(inner) => inner,
            Err(other) => PipelineError::RetrievalFailed(format!("{:#}", other)),
        }
    }
}

/// Durability failure on the interaction log.
#[derive(Debug, Error)]
#[error("interaction log write failed: {0}")]
pub struct LogWriteError(pub String);

impl From<std::io::Error> for LogWriteError {
    fn from(err: std::io::Error) -> Self {
        LogWriteError(err.to_string())
    }
}

impl From<serde_json::Error> for LogWriteError {
    fn from(err: serde_json::Error) -> Self {
        LogWriteError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_retrieval_preserves_timeout() {
        let err = anyhow::Error::new(PipelineError::Timeout {
            stage: "retrieve",
            secs: 5,
        });
        match PipelineError::from_retrieval(err) {
            PipelineError::Timeout { stage, secs } => {
                assert_eq!(stage, "retrieve");
                assert_eq!(secs, 5);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_from_retrieval_wraps_context_chain() {
        let err = anyhow::anyhow!("connection refused").context("search request failed");
        let mapped = PipelineError::from_retrieval(err);
        let msg = mapped.to_string();
        assert!(msg.contains("search request failed"));
        assert!(msg.contains("connection refused"));
    }
}
