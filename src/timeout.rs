//! Deadline decorators for external calls.
//!
//! A retrieval that overruns surfaces as [`PipelineError::Timeout`] inside
//! the `anyhow::Error`, which the engine recovers as a fatal timeout. A
//! generation that overruns is an ordinary error, so the run degrades to
//! the fallback answer. In both cases the inner future is dropped, which
//! cancels the in-flight request.

use anyhow::Result;
use async_trait::async_trait;
use scheme_nav_core::{Generator, PipelineError, Retriever, SearchHit};
use std::sync::Arc;
use std::time::Duration;

pub struct TimedRetriever {
    inner: Arc<dyn Retriever>,
    limit: Duration,
}

impl TimedRetriever {
    pub fn new(inner: Arc<dyn Retriever>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl Retriever for TimedRetriever {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        match tokio::time::timeout(self.limit, self.inner.search(query)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::Error::new(PipelineError::Timeout {
                stage: "retrieve",
                secs: self.limit.as_secs(),
            })),
        }
    }
}

pub struct TimedGenerator {
    inner: Arc<dyn Generator>,
    limit: Duration,
}

impl TimedGenerator {
    pub fn new(inner: Arc<dyn Generator>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl Generator for TimedGenerator {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn complete(&self, system_instruction: &str, prompt: &str) -> Result<String> {
        match tokio::time::timeout(self.limit, self.inner.complete(system_instruction, prompt))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(anyhow::Error::new(PipelineError::Timeout {
                stage: "generate",
                secs: self.limit.as_secs(),
            })),
        }
    }
}
