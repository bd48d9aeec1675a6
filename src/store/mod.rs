//! Persistence of completed practice rounds.
//!
//! Consumed after scoring, outside the core flow: save failures are logged
//! and never block the user-visible path.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::scoring::{RubricFeedback, RubricScores};

/// One completed, scored practice round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeRecord {
    pub motion_id: String,
    pub topic: String,
    #[serde(default)]
    pub stance: Option<String>,
    pub duration_seconds: u64,
    pub transcript: String,
    pub scores: RubricScores,
    pub feedback: RubricFeedback,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait PracticeStore: Send + Sync {
    async fn save(&self, record: &PracticeRecord) -> Result<()>;
}

/// Appends records as JSON lines to a single file.
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl PracticeStore for JsonlStore {
    async fn save(&self, record: &PracticeRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("failed to create records directory")?;
        }

        let mut line = serde_json::to_string(record).context("failed to serialize record")?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open records file: {:?}", self.path))?;

        file.write_all(line.as_bytes())
            .await
            .context("failed to append record")?;

        info!("practice record saved: {}", record.motion_id);
        Ok(())
    }
}
