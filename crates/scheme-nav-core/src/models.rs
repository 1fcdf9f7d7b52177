//! Core data models shared by the pipeline, the memory, and the adapters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier recorded for a passage whose source did not supply one.
pub const UNKNOWN_PASSAGE_ID: &str = "unknown";

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when rendering history into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One utterance in a session's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// A raw candidate as returned by a [`Retriever`](crate::retriever::Retriever).
///
/// Backends differ in what they fill in, so every field is optional.
/// The retrieve stage turns hits into [`Passage`]s with defaults applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHit {
    pub id: Option<String>,
    pub text: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl SearchHit {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            text: Some(text.into()),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A retrieved document chunk carried through a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    /// Stable source identifier, used for `[id]` citations.
    pub id: String,
    pub text: String,
    pub metadata: Map<String, Value>,
}

impl From<SearchHit> for Passage {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.id.unwrap_or_else(|| UNKNOWN_PASSAGE_ID.to_string()),
            text: hit.text.unwrap_or_default(),
            metadata: hit.metadata.unwrap_or_default(),
        }
    }
}

/// One line of the durable interaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Unix time in seconds, with sub-second precision.
    pub timestamp: f64,
    pub session_id: String,
    pub query: String,
    pub answer: String,
    pub retrieved_ids: Vec<String>,
}

impl InteractionRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        session_id: impl Into<String>,
        query: impl Into<String>,
        answer: impl Into<String>,
        retrieved_ids: Vec<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            timestamp: now.timestamp_micros() as f64 / 1_000_000.0,
            session_id: session_id.into(),
            query: query.into(),
            answer: answer.into(),
            retrieved_ids,
        }
    }
}

/// A paragraph-aligned slice of a source document.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// `<document_id>#<chunk_index>`.
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}
