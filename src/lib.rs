//! # Scheme Navigator
//!
//! A conversational assistant over agriculture scheme documents. Each
//! query runs a five-stage retrieval-augmented generation pipeline against
//! the session's conversation history, and every answered interaction is
//! appended to a JSONL audit log.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────────────────────┐
//! │ HTTP/CLI │──▶│ ChatService  │──▶│ Pipeline (scheme-nav-core)   │
//! └──────────┘   │ + Sessions   │   │ normalize → retrieve → build │
//!                └──────────────┘   │ → generate → finalize        │
//!                                   └──┬───────────┬───────────┬───┘
//!                                      ▼           ▼           ▼
//!                                 Retriever    Generator   JSONL log
//!                                 local/harness openai/ollama
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! schemenav check                       # validate config, list collaborators
//! schemenav ask "What subsidies exist for drip irrigation?"
//! schemenav chat                        # interactive session on stdin
//! schemenav serve                       # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`session`] | Session registry with optional TTL and capacity |
//! | [`interaction_log`] | Append-only JSONL audit log |
//! | [`retriever`] | Local corpus and remote search retrievers |
//! | [`generator`] | OpenAI-compatible and Ollama chat generators |
//! | [`timeout`] | Per-call deadlines |
//! | [`service`] | `start` / `continue` chat operations |
//! | [`server`] | HTTP server |

pub mod config;
pub mod generator;
pub mod http;
pub mod interaction_log;
pub mod retriever;
pub mod server;
pub mod service;
pub mod session;
pub mod timeout;
