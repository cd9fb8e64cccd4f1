use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::{AudioArtifact, SynthesisRequest};

/// Lifecycle state of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected state change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("item {item_id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub item_id: String,
    pub from: ItemStatus,
    pub to: ItemStatus,
}

/// One text-to-speech request inside a job.
#[derive(Debug, Clone)]
pub struct JobItem {
    pub id: String,
    /// Shared payload; the text is never copied per item.
    pub source: Arc<SynthesisRequest>,
    /// Output file name derived from the job's naming policy.
    pub output_name: String,
    status: ItemStatus,
    progress_percent: u8,
    error: Option<String>,
    result: Option<AudioArtifact>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    attempts: u32,
}

impl JobItem {
    /// Creates a pending item with a fresh id.
    pub fn new(source: Arc<SynthesisRequest>, output_name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source,
            output_name,
            status: ItemStatus::Pending,
            progress_percent: 0,
            error: None,
            result: None,
            started_at: None,
            finished_at: None,
            attempts: 0,
        }
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn name(&self) -> &str {
        &self.source.name
    }

    /// Percentage reported while processing; 100 once completed.
    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn result(&self) -> Option<&AudioArtifact> {
        self.result.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn reject(&self, to: ItemStatus) -> TransitionError {
        TransitionError {
            item_id: self.id.clone(),
            from: self.status,
            to,
        }
    }

    /// `Pending → Processing`.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != ItemStatus::Pending {
            return Err(self.reject(ItemStatus::Processing));
        }
        self.status = ItemStatus::Processing;
        self.started_at = Some(now);
        self.progress_percent = 0;
        Ok(())
    }

    /// Counts a gateway attempt. Only valid while processing.
    pub fn record_attempt(&mut self) -> Result<u32, TransitionError> {
        if self.status != ItemStatus::Processing {
            return Err(self.reject(ItemStatus::Processing));
        }
        self.attempts += 1;
        Ok(self.attempts)
    }

    /// `Processing → Processing` with a new percentage.
    pub fn set_progress(&mut self, percent: u8) -> Result<(), TransitionError> {
        if self.status != ItemStatus::Processing {
            return Err(self.reject(ItemStatus::Processing));
        }
        self.progress_percent = percent.min(100);
        Ok(())
    }

    /// `Processing → Completed`.
    pub fn complete(
        &mut self,
        artifact: AudioArtifact,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status != ItemStatus::Processing {
            return Err(self.reject(ItemStatus::Completed));
        }
        self.status = ItemStatus::Completed;
        self.progress_percent = 100;
        self.result = Some(artifact);
        self.finished_at = Some(now);
        Ok(())
    }

    /// `Processing → Failed`.
    pub fn fail(&mut self, error: String, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != ItemStatus::Processing {
            return Err(self.reject(ItemStatus::Failed));
        }
        self.status = ItemStatus::Failed;
        self.error = Some(error);
        self.finished_at = Some(now);
        Ok(())
    }
}
