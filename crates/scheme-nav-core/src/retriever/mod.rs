//! Document retrieval capability.
//!
//! The pipeline treats retrieval as an opaque, ranked search: it calls
//! [`Retriever::search`] once per run, keeps the first few hits in the
//! order returned, and never re-ranks them.
//!
//! Implementations:
//!
//! | Type | Crate | Backing |
//! |------|-------|---------|
//! | [`memory::InMemoryRetriever`] | core | Term-overlap ranking over passages held in memory |
//! | `CorpusRetriever` | `scheme-nav` | Local directory of translated documents, chunked into an in-memory index |
//! | `HarnessRetriever` | `scheme-nav` | Remote context-harness search service over HTTP |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::SearchHit;

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Short backend name for logs (e.g. `"local"`, `"harness"`).
    fn name(&self) -> &str;

    /// Return candidate passages for `query`, best match first.
    ///
    /// May return fewer hits than the backend's limit, including none.
    /// An `Err` is fatal to the pipeline run that issued it.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}
