//! # Scheme Navigator Core
//!
//! Runtime-agnostic logic for Scheme Navigator: data models, per-session
//! conversation memory, prompt assembly, the passage chunker, the
//! capability traits the pipeline consumes, and the five-stage
//! retrieval-augmented generation engine itself.
//!
//! This crate performs no network or filesystem I/O and does not depend
//! on tokio. Concrete retrievers, generators, the durable interaction log,
//! the session registry, and the HTTP surface live in the `scheme-nav`
//! application crate.
//!
//! ```text
//!  query ─▶ normalize ─▶ retrieve ─▶ build-context ─▶ generate ─▶ finalize ─▶ answer
//!                          │              │               │           │
//!                     Retriever   ConversationMemory  Generator  InteractionLog
//! ```

pub mod chunk;
pub mod error;
pub mod generator;
pub mod log;
pub mod memory;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod retriever;

pub use error::{LogWriteError, PipelineError};
pub use generator::{Generation, Generator};
pub use log::{InteractionLog, MemoryInteractionLog};
pub use memory::ConversationMemory;
pub use models::{InteractionRecord, Passage, Role, SearchHit, Turn};
pub use pipeline::{Pipeline, PipelineSettings, RunOutput, RunState, Stage};
pub use retriever::Retriever;
