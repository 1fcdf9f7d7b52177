//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/status` | Liveness with a unix timestamp |
//! | `GET`  | `/health` | Liveness with the crate version |
//! | `POST` | `/start` | Open a session and answer its first query |
//! | `POST` | `/continue` | Answer a follow-up in an existing session |
//!
//! Request bodies accept `query` (alias `user_query`) and `session_id`
//! (alias `user_id`).
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "session_not_found", "message": "session not found: 3f2a…" } }
//! ```
//!
//! | Code | Status | Cause |
//! |------|--------|-------|
//! | `bad_request` | 400 | empty query or malformed body |
//! | `session_not_found` | 404 | unknown, expired, or evicted session id |
//! | `unavailable` | 503 | retriever or generator not configured |
//! | `retrieval_failed` | 502 | retriever error |
//! | `timeout` | 504 | retriever deadline exceeded |
//! | `internal` | 500 | anything else |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use scheme_nav_core::PipelineError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::service::{ChatError, ChatService, Reply};

/// Starts the HTTP server with collaborators built from `config`.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = ChatService::from_config(config).await?;
    run_server_with_service(config, Arc::new(service)).await
}

/// Starts the HTTP server around an already-built [`ChatService`].
///
/// Lets embedders and tests supply their own retriever and generator.
pub async fn run_server_with_service(
    config: &Config,
    service: Arc<ChatService>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(service);

    info!(bind = %bind_addr, "server listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// The application router.
pub fn router(service: Arc<ChatService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/status", get(handle_status))
        .route("/health", get(handle_health))
        .route("/start", post(handle_start))
        .route("/continue", post(handle_continue))
        .layer(cors)
        .with_state(service)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        let message = err.to_string();
        match err {
            ChatError::BadRequest(_) => AppError::new(StatusCode::BAD_REQUEST, "bad_request", message),
            ChatError::Task(_) => {
                error!(error = %message, "pipeline task aborted");
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
            ChatError::Pipeline(inner) => match inner {
                PipelineError::SessionNotFound(_) => {
                    AppError::new(StatusCode::NOT_FOUND, "session_not_found", message)
                }
                PipelineError::MissingCollaborator(_) => {
                    AppError::new(StatusCode::SERVICE_UNAVAILABLE, "unavailable", message)
                }
                PipelineError::RetrievalFailed(_) => {
                    AppError::new(StatusCode::BAD_GATEWAY, "retrieval_failed", message)
                }
                PipelineError::Timeout { .. } => {
                    AppError::new(StatusCode::GATEWAY_TIMEOUT, "timeout", message)
                }
                PipelineError::TemplateError(_) => {
                    error!(error = %message, "prompt assembly failed");
                    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
                }
            },
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::new(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text())
    }
}

// ============ GET /status, GET /health ============

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    timestamp: f64,
}

async fn handle_status() -> Json<StatusResponse> {
    let now = chrono::Utc::now();
    Json(StatusResponse {
        status: "ok",
        timestamp: now.timestamp_micros() as f64 / 1_000_000.0,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ POST /start, POST /continue ============

#[derive(Deserialize)]
struct StartRequest {
    #[serde(alias = "user_query")]
    query: String,
}

#[derive(Deserialize)]
struct ContinueRequest {
    #[serde(alias = "user_id")]
    session_id: String,
    #[serde(alias = "user_query")]
    query: String,
}

async fn handle_start(
    State(service): State<Arc<ChatService>>,
    body: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<Reply>, AppError> {
    let Json(req) = body?;
    Ok(Json(service.start(&req.query).await?))
}

async fn handle_continue(
    State(service): State<Arc<ChatService>>,
    body: Result<Json<ContinueRequest>, JsonRejection>,
) -> Result<Json<Reply>, AppError> {
    let Json(req) = body?;
    Ok(Json(
        service.continue_session(&req.session_id, &req.query).await?,
    ))
}
