//! Chat service: the `start` / `continue` operations.
//!
//! Owns the [`SessionRegistry`] and the [`Pipeline`]. For each request it
//! resolves (or creates) the session, holds that session's memory lock for
//! the whole run, and returns the answer with the session id.
//!
//! Each run executes in its own spawned task. Dropping the request future
//! stops the wait, not the run, so memory and interaction log are always
//! updated together.

use anyhow::Result;
use scheme_nav_core::{InteractionLog, Pipeline, PipelineError, RunOutput};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info};

use crate::config::Config;
use crate::generator::create_generator;
use crate::interaction_log::JsonlInteractionLog;
use crate::retriever::create_retriever;
use crate::session::{SessionEntry, SessionRegistry};

/// Answer returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub session_id: String,
    pub answer: String,
}

/// Failure of a chat request.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("pipeline task failed: {0}")]
    Task(#[from] JoinError),
}

impl From<RunOutput> for Reply {
    fn from(output: RunOutput) -> Self {
        Self {
            session_id: output.session_id,
            answer: output.answer,
        }
    }
}

pub struct ChatService {
    sessions: Arc<SessionRegistry>,
    pipeline: Arc<Pipeline>,
}

impl ChatService {
    pub fn new(pipeline: Pipeline, sessions: SessionRegistry) -> Self {
        Self {
            sessions: Arc::new(sessions),
            pipeline: Arc::new(pipeline),
        }
    }

    /// Wire every collaborator from configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let log: Arc<dyn InteractionLog> =
            Arc::new(JsonlInteractionLog::open(&config.interaction_log.path).await?);

        let mut pipeline = Pipeline::new(log);

        let retriever_config = config.retriever.clone();
        let retriever =
            tokio::task::spawn_blocking(move || create_retriever(&retriever_config)).await??;
        if let Some(retriever) = retriever {
            pipeline = pipeline.with_retriever(retriever);
        }
        if let Some(generator) = create_generator(&config.generator)? {
            pipeline = pipeline.with_generator(generator);
        }

        info!(
            retriever = %config.retriever.provider,
            generator = %config.generator.provider,
            interaction_log = %config.interaction_log.path.display(),
            "chat service ready"
        );

        Ok(Self::new(
            pipeline,
            SessionRegistry::from_config(&config.sessions),
        ))
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Open a new session and answer its first query.
    ///
    /// If the run fails the new session is discarded, so a failed start
    /// leaves the registry as it was.
    pub async fn start(&self, query: &str) -> Result<Reply, ChatError> {
        check_query(query)?;
        let entry = self.sessions.get_or_create(None)?;
        info!(session_id = %entry.id(), "session started");

        let output = self.spawn_run(entry, query, true).await??;
        Ok(output.into())
    }

    /// Answer a follow-up within an existing session.
    pub async fn continue_session(&self, session_id: &str, query: &str) -> Result<Reply, ChatError> {
        check_query(query)?;
        let entry = self.sessions.get_or_create(Some(session_id))?;

        let output = self.spawn_run(entry, query, false).await??;
        Ok(output.into())
    }

    fn spawn_run(
        &self,
        entry: Arc<SessionEntry>,
        query: &str,
        discard_on_failure: bool,
    ) -> JoinHandle<Result<RunOutput, PipelineError>> {
        let pipeline = self.pipeline.clone();
        let sessions = self.sessions.clone();
        let query = query.to_string();

        tokio::spawn(async move {
            let mut memory = entry.lock().await;
            let result = pipeline.run(entry.id(), &query, &mut memory).await;
            drop(memory);

            if result.is_err() && discard_on_failure {
                sessions.remove(entry.id());
                debug!(session_id = %entry.id(), "discarded session after failed first run");
            }
            result
        })
    }
}

fn check_query(query: &str) -> Result<(), ChatError> {
    if query.trim().is_empty() {
        return Err(ChatError::BadRequest("query must not be empty".to_string()));
    }
    Ok(())
}
