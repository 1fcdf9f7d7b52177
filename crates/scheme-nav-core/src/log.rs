//! Interaction log sink.
//!
//! The finalize stage appends one [`InteractionRecord`] per completed run.
//! The pipeline never reads the log back. A failed append is reported to
//! the caller as a [`LogWriteError`] and never fails the run.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LogWriteError;
use crate::models::InteractionRecord;

#[async_trait]
pub trait InteractionLog: Send + Sync {
    /// Durably append one record. Appends from concurrent runs must not
    /// interleave.
    async fn append(&self, record: &InteractionRecord) -> Result<(), LogWriteError>;
}

/// Keeps records in memory, for tests and embedding callers.
#[derive(Default)]
pub struct MemoryInteractionLog {
    records: Mutex<Vec<InteractionRecord>>,
}

impl MemoryInteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records appended so far, in append order.
    pub fn records(&self) -> Vec<InteractionRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl InteractionLog for MemoryInteractionLog {
    async fn append(&self, record: &InteractionRecord) -> Result<(), LogWriteError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| LogWriteError("interaction log mutex poisoned".to_string()))?;
        records.push(record.clone());
        Ok(())
    }
}
