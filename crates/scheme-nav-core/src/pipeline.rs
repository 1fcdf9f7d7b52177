//! The five-stage retrieval-augmented generation engine.
//!
//! A run threads a [`RunState`] through a fixed sequence of stages:
//!
//! | Stage | Reads | Writes | Failure |
//! |-------|-------|--------|---------|
//! | [`Stage::Normalize`] | query | `normalized_query` | cannot fail |
//! | [`Stage::Retrieve`] | `normalized_query` | `retrieved` | fatal |
//! | [`Stage::BuildContext`] | memory, `retrieved`, `normalized_query` | `constructed_prompt` | fatal (`TemplateError`) |
//! | [`Stage::Generate`] | `constructed_prompt` | `generation` | absorbed as [`Generation::Degraded`] |
//! | [`Stage::Finalize`] | everything | memory, interaction log, `final_answer` | log errors absorbed |
//!
//! Each field is written once, by its stage, and stages never branch or
//! retry. Fatal errors return before finalize, so a failed run leaves the
//! conversation memory untouched and writes no log record.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::generator::{Generation, Generator};
use crate::log::InteractionLog;
use crate::memory::ConversationMemory;
use crate::models::{InteractionRecord, Passage, SearchHit};
use crate::prompt::{self, PromptTemplate};
use crate::retriever::Retriever;

/// Maximum passages carried past the retrieve stage.
pub const MAX_PASSAGES: usize = 6;

/// Characters of each passage shown in the source block.
pub const SNIPPET_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalize,
    Retrieve,
    BuildContext,
    Generate,
    Finalize,
}

impl Stage {
    /// Execution order of a run.
    pub const ORDER: [Stage; 5] = [
        Stage::Normalize,
        Stage::Retrieve,
        Stage::BuildContext,
        Stage::Generate,
        Stage::Finalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::Retrieve => "retrieve",
            Stage::BuildContext => "build_context",
            Stage::Generate => "generate",
            Stage::Finalize => "finalize",
        }
    }
}

/// Prompt text used by a [`Pipeline`].
///
/// The passage cap and snippet length are fixed at [`MAX_PASSAGES`] and
/// [`SNIPPET_CHARS`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub system_instruction: String,
    pub fallback_answer: String,
    pub template: PromptTemplate,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            system_instruction: prompt::SYSTEM_INSTRUCTION.to_string(),
            fallback_answer: prompt::FALLBACK_ANSWER.to_string(),
            template: PromptTemplate::default(),
        }
    }
}

/// Transient state of one run.
///
/// Fields are private and each has exactly one writer stage, so later
/// stages can read earlier results but cannot rewrite them.
#[derive(Debug, Clone)]
pub struct RunState {
    session_id: String,
    query: String,
    normalized_query: Option<String>,
    retrieved: Option<Vec<Passage>>,
    constructed_prompt: Option<String>,
    generation: Option<Generation>,
    final_answer: Option<String>,
    log_error: Option<String>,
}

impl RunState {
    pub fn new(session_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            query: query.into(),
            normalized_query: None,
            retrieved: None,
            constructed_prompt: None,
            generation: None,
            final_answer: None,
            log_error: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn normalized_query(&self) -> Option<&str> {
        self.normalized_query.as_deref()
    }

    pub fn retrieved(&self) -> Option<&[Passage]> {
        self.retrieved.as_deref()
    }

    pub fn constructed_prompt(&self) -> Option<&str> {
        self.constructed_prompt.as_deref()
    }

    pub fn generation(&self) -> Option<&Generation> {
        self.generation.as_ref()
    }

    /// Answer text produced by the generate stage (possibly the fallback).
    pub fn answer(&self) -> Option<&str> {
        self.generation.as_ref().map(Generation::text)
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    fn retrieved_ids(&self) -> Vec<String> {
        self.retrieved
            .iter()
            .flatten()
            .map(|p| p.id.clone())
            .collect()
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub session_id: String,
    pub answer: String,
    pub retrieved_ids: Vec<String>,
    pub constructed_prompt: String,
    /// Generator failure cause when the answer is the fallback text.
    pub degraded: Option<String>,
    /// Interaction log failure, if the audit write did not succeed.
    pub log_error: Option<String>,
}

impl RunOutput {
    fn from_state(state: RunState) -> Self {
        let retrieved_ids = state.retrieved_ids();
        Self {
            degraded: state.generation.as_ref().and_then(|g| g.cause().map(str::to_string)),
            answer: state.final_answer.unwrap_or_default(),
            constructed_prompt: state.constructed_prompt.unwrap_or_default(),
            session_id: state.session_id,
            retrieved_ids,
            log_error: state.log_error,
        }
    }
}

/// Normalize: identity copy of the raw query.
///
/// This is where query rewriting or spell correction would go.
pub fn normalize(mut state: RunState) -> RunState {
    state.normalized_query = Some(state.query.clone());
    state
}

/// Keep the first [`MAX_PASSAGES`] hits in retriever order.
pub fn select_passages(hits: Vec<SearchHit>) -> Vec<Passage> {
    hits.into_iter()
        .take(MAX_PASSAGES)
        .map(Passage::from)
        .collect()
}

/// Build context: render history and sources into the prompt template.
pub fn build_context(
    mut state: RunState,
    memory: &ConversationMemory,
    settings: &PipelineSettings,
) -> Result<RunState, PipelineError> {
    let query = state
        .normalized_query
        .as_deref()
        .ok_or_else(|| PipelineError::TemplateError("normalized query is absent".to_string()))?;
    let passages = state
        .retrieved
        .as_deref()
        .ok_or_else(|| PipelineError::TemplateError("retrieved passages are absent".to_string()))?;

    let history = prompt::render_history(memory.turns());
    let sources = prompt::render_sources(passages, SNIPPET_CHARS);
    state.constructed_prompt = Some(settings.template.render(&history, &sources, query));
    Ok(state)
}

/// The pipeline engine.
///
/// Collaborators are injected; a missing retriever or generator is
/// reported as [`PipelineError::MissingCollaborator`] when its stage runs.
pub struct Pipeline {
    retriever: Option<Arc<dyn Retriever>>,
    generator: Option<Arc<dyn Generator>>,
    log: Arc<dyn InteractionLog>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(log: Arc<dyn InteractionLog>) -> Self {
        Self {
            retriever: None,
            generator: None,
            log,
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn has_retriever(&self) -> bool {
        self.retriever.is_some()
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Run all stages for one query against `memory`.
    ///
    /// The caller must hold exclusive access to `memory` for the whole
    /// call; history is read in build-context and appended in finalize.
    pub async fn run(
        &self,
        session_id: &str,
        query: &str,
        memory: &mut ConversationMemory,
    ) -> Result<RunOutput, PipelineError> {
        let mut state = RunState::new(session_id, query);
        for stage in Stage::ORDER {
            debug!(session_id, stage = stage.as_str(), "running stage");
            state = self.advance(stage, state, memory).await?;
        }
        Ok(RunOutput::from_state(state))
    }

    async fn advance(
        &self,
        stage: Stage,
        state: RunState,
        memory: &mut ConversationMemory,
    ) -> Result<RunState, PipelineError> {
        match stage {
            Stage::Normalize => Ok(normalize(state)),
            Stage::Retrieve => self.retrieve(state).await,
            Stage::BuildContext => build_context(state, memory, &self.settings),
            Stage::Generate => self.generate(state).await,
            Stage::Finalize => Ok(self.finalize(state, memory).await),
        }
    }

    async fn retrieve(&self, mut state: RunState) -> Result<RunState, PipelineError> {
        let retriever = self
            .retriever
            .as_ref()
            .ok_or_else(|| PipelineError::MissingCollaborator("retriever".to_string()))?;
        let query = state.normalized_query.as_deref().unwrap_or_default();

        let hits = retriever
            .search(query)
            .await
            .map_err(PipelineError::from_retrieval)?;
        let total = hits.len();
        let passages = select_passages(hits);

        debug!(
            session_id = %state.session_id,
            retriever = retriever.name(),
            total,
            kept = passages.len(),
            "retrieved passages"
        );
        state.retrieved = Some(passages);
        Ok(state)
    }

    async fn generate(&self, mut state: RunState) -> Result<RunState, PipelineError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| PipelineError::MissingCollaborator("generator".to_string()))?;
        let prompt = state.constructed_prompt.as_deref().unwrap_or_default();

        let generation = match generator
            .complete(&self.settings.system_instruction, prompt)
            .await
        {
            Ok(text) => Generation::Ok(text),
            Err(err) => {
                let cause = format!("{:#}", err);
                warn!(
                    session_id = %state.session_id,
                    model = generator.model_name(),
                    %cause,
                    "generation degraded, using fallback answer"
                );
                Generation::Degraded {
                    fallback: self.settings.fallback_answer.clone(),
                    cause,
                }
            }
        };
        state.generation = Some(generation);
        Ok(state)
    }

    async fn finalize(&self, mut state: RunState, memory: &mut ConversationMemory) -> RunState {
        let query = state.normalized_query.clone().unwrap_or_default();
        let answer = state.answer().unwrap_or_default().to_string();

        if !query.is_empty() && !answer.is_empty() {
            memory.append(query.clone(), answer.clone());
        }

        let record = InteractionRecord::new(
            state.session_id.clone(),
            query,
            answer.clone(),
            state.retrieved_ids(),
        );
        if let Err(err) = self.log.append(&record).await {
            warn!(session_id = %state.session_id, error = %err, "could not record interaction");
            state.log_error = Some(err.to_string());
        }

        info!(
            session_id = %state.session_id,
            passages = record.retrieved_ids.len(),
            degraded = state.generation.as_ref().is_some_and(Generation::is_degraded),
            "query answered"
        );
        state.final_answer = Some(answer);
        state
    }
}
