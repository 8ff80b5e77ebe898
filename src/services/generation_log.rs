use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::core::errors::GenerationLogError;
use crate::core::types::SessionId;

/// Lifecycle marker of a generation event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Started,
    Completed,
    Failed,
    Error,
}

/// One JSON line in the daily generation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationLogEntry {
    pub timestamp: String,
    pub session_id: String,
    pub status: GenerationStatus,
    pub details: serde_json::Value,
}

/// Append-only JSON-lines sink, one file per calendar day
#[derive(Debug, Clone)]
pub struct GenerationLog {
    dir: PathBuf,
}

impl GenerationLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("generation_{}.json", date.format("%Y%m%d")))
    }

    pub fn today_file(&self) -> PathBuf {
        self.file_for(Local::now().date_naive())
    }

    pub async fn try_append(
        &self,
        session_id: &SessionId,
        status: GenerationStatus,
        details: serde_json::Value,
    ) -> Result<(), GenerationLogError> {
        let entry = GenerationLogEntry {
            timestamp: Local::now().to_rfc3339(),
            session_id: session_id.to_string(),
            status,
            details,
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let path = self.today_file();
        let write_err = |source| GenerationLogError::Write {
            path: path.display().to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(write_err)?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(write_err)?;
        // Single write per line so concurrent sessions do not interleave
        file.write_all(line.as_bytes()).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        Ok(())
    }

    /// Best-effort append: failures are logged and reported, never propagated
    pub async fn append(
        &self,
        session_id: &SessionId,
        status: GenerationStatus,
        details: serde_json::Value,
    ) -> bool {
        match self.try_append(session_id, status, details).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to log generation for session {}: {}", session_id, e);
                false
            }
        }
    }

    /// All well-formed entries for a given day; a missing file yields none
    pub async fn entries_on(&self, date: NaiveDate) -> std::io::Result<Vec<GenerationLogEntry>> {
        let content = match tokio::fs::read_to_string(self.file_for(date)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str::<GenerationLogEntry>(line).ok())
            .collect())
    }

    /// Linear scan of one day's file counting `completed` entries
    pub async fn completed_on(&self, date: NaiveDate) -> std::io::Result<usize> {
        Ok(self
            .entries_on(date)
            .await?
            .iter()
            .filter(|entry| entry.status == GenerationStatus::Completed)
            .count())
    }

    pub async fn completed_today(&self) -> std::io::Result<usize> {
        self.completed_on(Local::now().date_naive()).await
    }
}
