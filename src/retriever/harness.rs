//! Remote search service retriever.
//!
//! Calls a context-harness style tool endpoint:
//!
//! ```text
//! POST {url}/tools/search
//! {"query": "...", "mode": "hybrid", "limit": 12}
//!
//! 200 {"result": {"results": [{"id": "...", "snippet": "...", "score": 0.8, ...}]}}
//! ```
//!
//! Each result becomes a [`SearchHit`]: `id` (falling back to `source_id`),
//! `snippet` as the passage text, every other field as metadata.

use anyhow::{bail, Result};
use async_trait::async_trait;
use scheme_nav_core::{Retriever, SearchHit};
use serde_json::{json, Value};

use crate::config::RetrieverConfig;
use crate::http;

pub struct HarnessRetriever {
    endpoint: String,
    mode: String,
    limit: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl HarnessRetriever {
    pub fn new(config: &RetrieverConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("retriever.url required for harness provider"))?;
        Ok(Self {
            endpoint: format!("{}/tools/search", url.trim_end_matches('/')),
            mode: config.mode.clone(),
            limit: config.limit,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Retriever for HarnessRetriever {
    fn name(&self) -> &str {
        "harness"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let body = json!({
            "query": query,
            "mode": self.mode,
            "limit": self.limit,
        });
        let json = http::post_json(
            &self.client,
            &self.endpoint,
            None,
            &body,
            self.max_retries,
            "Search service",
        )
        .await?;
        parse_search_response(&json)
    }
}

/// Map `result.results[]` into hits, preserving order.
pub fn parse_search_response(json: &Value) -> Result<Vec<SearchHit>> {
    let Some(results) = json
        .get("result")
        .and_then(|r| r.get("results"))
        .and_then(Value::as_array)
    else {
        bail!("Invalid search response: missing result.results array");
    };

    Ok(results.iter().map(result_to_hit).collect())
}

fn result_to_hit(item: &Value) -> SearchHit {
    let mut metadata = item.as_object().cloned().unwrap_or_default();
    let id = metadata
        .remove("id")
        .and_then(as_string)
        .or_else(|| metadata.get("source_id").cloned().and_then(as_string));
    let text = metadata.remove("snippet").and_then(as_string);

    SearchHit {
        id,
        text,
        metadata: Some(metadata),
    }
}

fn as_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
