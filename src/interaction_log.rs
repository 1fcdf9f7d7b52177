//! Append-only JSONL interaction log.
//!
//! One JSON object per line:
//!
//! ```json
//! {"timestamp":1718000000.123,"session_id":"…","query":"…","answer":"…","retrieved_ids":["doc1"]}
//! ```
//!
//! Each record is serialized up front and written with a single
//! `write_all` while the file mutex is held, so concurrent sessions never
//! interleave partial lines.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use scheme_nav_core::{InteractionLog, InteractionRecord, LogWriteError};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct JsonlInteractionLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlInteractionLog {
    /// Open (or create) the log for appending, creating parent directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open interaction log: {}", path.display()))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl InteractionLog for JsonlInteractionLog {
    async fn append(&self, record: &InteractionRecord) -> Result<(), LogWriteError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Read every record back, skipping blank lines.
pub fn read_records(path: &Path) -> Result<Vec<InteractionRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read interaction log: {}", path.display()))?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str::<InteractionRecord>(line)
                .with_context(|| format!("Malformed interaction log line {}", i + 1))
        })
        .collect()
}
