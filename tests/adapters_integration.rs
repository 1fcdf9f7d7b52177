//! Integration tests for the HTTP-backed retriever and generators.
//!
//! A small axum app stands in for the search service and the chat APIs so
//! the real request/response handling, retry policy, and config wiring are
//! exercised without network access.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use scheme_nav::config::{parse_config, GeneratorConfig, RetrieverConfig};
use scheme_nav::generator::{ChatApi, ChatGenerator};
use scheme_nav::interaction_log::read_records;
use scheme_nav::retriever::HarnessRetriever;
use scheme_nav::service::ChatService;
use scheme_nav_core::{Generator, Retriever};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ─── Mock upstream ──────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Upstream {
    /// Number of leading requests answered with 503.
    fail_first: usize,
    calls: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

impl Upstream {
    fn record(&self, body: Value) -> bool {
        self.bodies.lock().unwrap().push(body);
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        n < self.fail_first
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_body(&self) -> Value {
        self.bodies.lock().unwrap().last().cloned().unwrap()
    }
}

async fn search(
    State(up): State<Upstream>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if up.record(body) {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(json!({
        "result": {
            "results": [
                {"id": "kisan-1", "snippet": "PM-KISAN pays income support to farmers.", "score": 0.91},
                {"source_id": "circulars/seeds.txt", "snippet": "Seed subsidy circular.", "score": 0.42}
            ]
        }
    })))
}

async fn openai_chat(
    State(up): State<Upstream>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if up.record(body) {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(json!({
        "choices": [{"message": {"role": "assistant", "content": "PM-KISAN gives income support [kisan-1]."}}]
    })))
}

async fn ollama_chat(
    State(up): State<Upstream>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if up.record(body) {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(json!({
        "model": "llama3.1:8b",
        "message": {"role": "assistant", "content": " Drip irrigation is subsidised [drip.txt#0]. "},
        "done": true
    })))
}

async fn reject(State(up): State<Upstream>, Json(body): Json<Value>) -> StatusCode {
    up.record(body);
    StatusCode::UNAUTHORIZED
}

async fn spawn_upstream(up: Upstream) -> String {
    let app = Router::new()
        .route("/tools/search", post(search))
        .route("/v1/chat/completions", post(openai_chat))
        .route("/api/chat", post(ollama_chat))
        .route("/denied/chat/completions", post(reject))
        .with_state(up);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn harness_config(url: &str) -> RetrieverConfig {
    RetrieverConfig {
        provider: "harness".to_string(),
        url: Some(url.to_string()),
        mode: "hybrid".to_string(),
        limit: 5,
        max_retries: 2,
        ..RetrieverConfig::default()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_harness_retriever_maps_results() {
    let up = Upstream::default();
    let url = spawn_upstream(up.clone()).await;
    let retriever = HarnessRetriever::new(&harness_config(&url)).unwrap();

    let hits = retriever.search("income support").await.unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id.as_deref(), Some("kisan-1"));
    assert_eq!(
        hits[0].text.as_deref(),
        Some("PM-KISAN pays income support to farmers.")
    );
    assert_eq!(hits[1].id.as_deref(), Some("circulars/seeds.txt"));

    let sent = up.last_body();
    assert_eq!(sent["query"], "income support");
    assert_eq!(sent["mode"], "hybrid");
    assert_eq!(sent["limit"], 5);
}

#[tokio::test]
async fn test_harness_retriever_retries_server_errors() {
    let up = Upstream {
        fail_first: 1,
        ..Upstream::default()
    };
    let url = spawn_upstream(up.clone()).await;
    let retriever = HarnessRetriever::new(&harness_config(&url)).unwrap();

    let hits = retriever.search("seeds").await.unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(up.calls(), 2);
}

#[tokio::test]
async fn test_openai_generator_sends_bearer_messages() {
    let up = Upstream::default();
    let url = spawn_upstream(up.clone()).await;
    std::env::set_var("SCHEMENAV_IT_OPENAI_KEY", "test-key");

    let config = GeneratorConfig {
        provider: "openai".to_string(),
        model: Some("meta-llama/llama-4-scout-17b-16e-instruct".to_string()),
        url: Some(format!("{}/v1", url)),
        api_key_env: "SCHEMENAV_IT_OPENAI_KEY".to_string(),
        temperature: Some(0.2),
        ..GeneratorConfig::default()
    };
    let generator = ChatGenerator::new(ChatApi::OpenAi, &config).unwrap();

    let answer = generator
        .complete("You are an assistant.", "What is PM-KISAN?")
        .await
        .unwrap();
    assert_eq!(answer, "PM-KISAN gives income support [kisan-1].");

    let sent = up.last_body();
    assert_eq!(sent["model"], "meta-llama/llama-4-scout-17b-16e-instruct");
    assert_eq!(sent["messages"][0]["content"], "You are an assistant.");
    assert_eq!(sent["messages"][1]["role"], "user");
    assert!(sent.get("stream").is_none());
}

#[tokio::test]
async fn test_client_errors_fail_fast() {
    let up = Upstream::default();
    let url = spawn_upstream(up.clone()).await;
    std::env::set_var("SCHEMENAV_IT_DENIED_KEY", "bad-key");

    let config = GeneratorConfig {
        provider: "openai".to_string(),
        url: Some(format!("{}/denied", url)),
        api_key_env: "SCHEMENAV_IT_DENIED_KEY".to_string(),
        max_retries: 3,
        ..GeneratorConfig::default()
    };
    let generator = ChatGenerator::new(ChatApi::OpenAi, &config).unwrap();

    let err = generator.complete("sys", "prompt").await.unwrap_err();
    assert!(err.to_string().contains("401"));
    assert_eq!(up.calls(), 1);
}

#[tokio::test]
async fn test_service_from_config_end_to_end() {
    let up = Upstream::default();
    let url = spawn_upstream(up.clone()).await;

    let tmp = TempDir::new().unwrap();
    let corpus = tmp.path().join("corpus");
    std::fs::create_dir_all(&corpus).unwrap();
    std::fs::write(
        corpus.join("drip.txt"),
        "Drip irrigation equipment is subsidised for small and marginal farmers.",
    )
    .unwrap();
    std::fs::write(corpus.join("loans.txt"), "Crop loans carry reduced interest.").unwrap();
    let log_path = tmp.path().join("logs").join("interactions.jsonl");

    let config = parse_config(&format!(
        r#"
[interaction_log]
path = "{log}"

[retriever]
provider = "local"
corpus_dir = "{corpus}"

[generator]
provider = "ollama"
model = "llama3.1:8b"
url = "{url}"
"#,
        log = log_path.display(),
        corpus = corpus.display(),
        url = url,
    ))
    .unwrap();

    let service = ChatService::from_config(&config).await.unwrap();
    let reply = service
        .start("Is drip irrigation subsidised?")
        .await
        .unwrap();

    assert_eq!(reply.answer, "Drip irrigation is subsidised [drip.txt#0].");

    let sent = up.last_body();
    assert_eq!(sent["stream"], false);
    let prompt = sent["messages"][1]["content"].as_str().unwrap();
    assert!(prompt.contains("[drip.txt#0] Drip irrigation equipment"));
    assert!(!prompt.contains("[loans.txt#0]"));

    let records = read_records(&log_path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].session_id, reply.session_id);
    assert_eq!(records[0].retrieved_ids, vec!["drip.txt#0"]);
}
