//! Concrete retrievers.
//!
//! | Provider | Type | Source |
//! |----------|------|--------|
//! | `local` | [`CorpusRetriever`] | text files under `retriever.corpus_dir` |
//! | `harness` | [`HarnessRetriever`] | a remote `/tools/search` endpoint |
//! | `disabled` | none | runs fail with `MissingCollaborator` |
//!
//! Whatever is built is wrapped in a [`TimedRetriever`] using
//! `retriever.timeout_secs`.

mod corpus;
mod harness;

pub use corpus::CorpusRetriever;
pub use harness::HarnessRetriever;

use anyhow::{bail, Result};
use scheme_nav_core::Retriever;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::RetrieverConfig;
use crate::timeout::TimedRetriever;

/// Build the configured retriever, or `None` when disabled.
pub fn create_retriever(config: &RetrieverConfig) -> Result<Option<Arc<dyn Retriever>>> {
    let inner: Arc<dyn Retriever> = match config.provider.as_str() {
        "disabled" => return Ok(None),
        "local" => {
            let corpus = CorpusRetriever::load(config)?;
            info!(
                passages = corpus.len(),
                documents = corpus.documents(),
                "loaded local corpus"
            );
            Arc::new(corpus)
        }
        "harness" => Arc::new(HarnessRetriever::new(config)?),
        other => bail!("Unknown retriever provider: {}", other),
    };

    Ok(Some(Arc::new(TimedRetriever::new(
        inner,
        Duration::from_secs(config.timeout_secs),
    ))))
}
