//! End-to-end tests of the HTTP surface.
//!
//! Each test starts the real router on a free local port with an
//! in-memory corpus, a scripted generator, and a JSONL log in a temp dir.

use anyhow::Result;
use async_trait::async_trait;
use scheme_nav::config::Config;
use scheme_nav::interaction_log::{read_records, JsonlInteractionLog};
use scheme_nav::server::run_server_with_service;
use scheme_nav::service::ChatService;
use scheme_nav::session::SessionRegistry;
use scheme_nav::timeout::TimedRetriever;
use scheme_nav_core::retriever::memory::InMemoryRetriever;
use scheme_nav_core::{Generator, Passage, Pipeline, Retriever, SearchHit};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ─── Test Generator ─────────────────────────────────────────────────

/// Cites the first source id it finds in the prompt.
struct CitingGenerator;

#[async_trait]
impl Generator for CitingGenerator {
    fn model_name(&self) -> &str {
        "citing"
    }

    async fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
        let cited = prompt
            .lines()
            .find_map(|line| {
                let rest = line.strip_prefix('[')?;
                Some(rest[..rest.find(']')?].to_string())
            })
            .unwrap_or_else(|| "none".to_string());
        Ok(format!("See [{}].", cited))
    }
}

// ─── Test Retrievers ────────────────────────────────────────────────

struct DownRetriever;

#[async_trait]
impl Retriever for DownRetriever {
    fn name(&self) -> &str {
        "down"
    }

    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>> {
        anyhow::bail!("connection refused")
    }
}

struct HungRetriever;

#[async_trait]
impl Retriever for HungRetriever {
    fn name(&self) -> &str {
        "hung"
    }

    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

fn corpus() -> InMemoryRetriever {
    [
        ("doc1", "Scheme A helps farmers with drip irrigation subsidies."),
        ("doc2", "Scheme B offers crop insurance to farmers."),
    ]
    .into_iter()
    .map(|(id, text)| Passage {
        id: id.to_string(),
        text: text.to_string(),
        metadata: Map::new(),
    })
    .collect()
}

/// Start a server and return its base URL and log path.
async fn start_server(tmp: &TempDir, with_generator: bool) -> (String, PathBuf) {
    let generator: Option<Arc<dyn Generator>> = if with_generator {
        Some(Arc::new(CitingGenerator))
    } else {
        None
    };
    let (base, log_path, _) = start_server_with(tmp, Arc::new(corpus()), generator).await;
    (base, log_path)
}

/// Start a server around the given collaborators; also returns the service
/// so tests can inspect its sessions.
async fn start_server_with(
    tmp: &TempDir,
    retriever: Arc<dyn Retriever>,
    generator: Option<Arc<dyn Generator>>,
) -> (String, PathBuf, Arc<ChatService>) {
    let log_path = tmp.path().join("interactions.jsonl");
    let log = Arc::new(JsonlInteractionLog::open(&log_path).await.unwrap());

    let mut pipeline = Pipeline::new(log).with_retriever(retriever);
    if let Some(generator) = generator {
        pipeline = pipeline.with_generator(generator);
    }
    let service = Arc::new(ChatService::new(pipeline, SessionRegistry::new()));

    let port = find_free_port();
    let mut config = Config::minimal();
    config.server.bind = format!("127.0.0.1:{}", port);

    let served = service.clone();
    tokio::spawn(async move {
        run_server_with_service(&config, served).await.unwrap();
    });
    wait_for_server(port).await;

    (format!("http://127.0.0.1:{}", port), log_path, service)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_status_and_health() {
    let tmp = TempDir::new().unwrap();
    let (base, _) = start_server(&tmp, true).await;
    let client = reqwest::Client::new();

    let status: Value = client
        .get(format!("{}/status", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "ok");
    assert!(status["timestamp"].as_f64().unwrap() > 1_600_000_000.0);

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_start_and_continue_conversation() {
    let tmp = TempDir::new().unwrap();
    let (base, log_path) = start_server(&tmp, true).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/start", base))
        .json(&json!({ "query": "What schemes exist for farmers?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let first: Value = resp.json().await.unwrap();
    let session_id = first["session_id"].as_str().unwrap().to_string();
    assert_eq!(first["answer"], "See [doc1].");

    let resp = client
        .post(format!("{}/continue", base))
        .json(&json!({ "user_id": &session_id, "user_query": "Tell me about crop insurance" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let second: Value = resp.json().await.unwrap();
    assert_eq!(second["session_id"], session_id.as_str());
    assert_eq!(second["answer"], "See [doc2].");

    let records = read_records(&log_path).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.session_id == session_id));
    assert_eq!(records[0].retrieved_ids, vec!["doc1", "doc2"]);
    assert_eq!(records[1].retrieved_ids, vec!["doc2"]);
}

#[tokio::test]
async fn test_continue_unknown_session_is_404() {
    let tmp = TempDir::new().unwrap();
    let (base, log_path) = start_server(&tmp, true).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/continue", base))
        .json(&json!({ "session_id": "does-not-exist", "query": "hello farmers" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "session_not_found");

    assert!(read_records(&log_path).unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_query_is_400() {
    let tmp = TempDir::new().unwrap();
    let (base, _) = start_server(&tmp, true).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/start", base))
        .json(&json!({ "query": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let tmp = TempDir::new().unwrap();
    let (base, _) = start_server(&tmp, true).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/start", base))
        .json(&json!({ "question": "wrong field" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_missing_generator_is_503() {
    let tmp = TempDir::new().unwrap();
    let (base, log_path) = start_server(&tmp, false).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/start", base))
        .json(&json!({ "query": "What schemes exist for farmers?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unavailable");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("generator"));

    assert!(read_records(&log_path).unwrap().is_empty());
}

#[tokio::test]
async fn test_retriever_failure_is_502_and_leaves_no_trace() {
    let tmp = TempDir::new().unwrap();
    let (base, log_path, service) =
        start_server_with(&tmp, Arc::new(DownRetriever), Some(Arc::new(CitingGenerator))).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/start", base))
        .json(&json!({ "query": "What schemes exist for farmers?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "retrieval_failed");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("connection refused"));

    assert!(read_records(&log_path).unwrap().is_empty());
    assert!(service.sessions().is_empty());
}

#[tokio::test]
async fn test_retriever_timeout_is_504() {
    let tmp = TempDir::new().unwrap();
    let retriever = Arc::new(TimedRetriever::new(
        Arc::new(HungRetriever),
        Duration::from_millis(50),
    ));
    let (base, log_path, service) =
        start_server_with(&tmp, retriever, Some(Arc::new(CitingGenerator))).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/start", base))
        .json(&json!({ "query": "What schemes exist for farmers?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 504);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "timeout");

    assert!(read_records(&log_path).unwrap().is_empty());
    assert!(service.sessions().is_empty());
}
