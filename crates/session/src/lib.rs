//! JSON-file session store.
//!
//! Persists conversation snapshots to a single JSON file under the config
//! directory. The agent hands over a snapshot after each successful query;
//! `load` restores the previous conversation for `chat --resume`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use ferrite_core::error::SessionError;
use ferrite_core::message::Message;
use ferrite_core::SessionSink;

/// One persisted conversation snapshot.
#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    saved_at: DateTime<Utc>,
    messages: Vec<Message>,
}

/// Stores the conversation as a JSON file at a fixed path.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionSink for FileSessionStore {
    async fn save(&self, messages: &[Message]) -> Result<(), SessionError> {
        let record = SessionRecord {
            saved_at: Utc::now(),
            messages: messages.to_vec(),
        };
        let payload = serde_json::to_vec_pretty(&record)
            .map_err(|e| SessionError::Storage(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SessionError::Storage(e.to_string()))?;
        }
        tokio::fs::write(&self.path, payload)
            .await
            .map_err(|e| SessionError::Storage(e.to_string()))?;

        debug!(path = %self.path.display(), count = messages.len(), "Saved session snapshot");
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Message>, SessionError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SessionError::Storage(e.to_string())),
        };

        let record: SessionRecord = serde_json::from_slice(&bytes)
            .map_err(|e| SessionError::Corrupt(e.to_string()))?;
        Ok(record.messages)
    }
}
