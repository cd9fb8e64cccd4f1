use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::{ItemStatus, JobItem};
use super::settings::OutputSettings;

/// Whether a job came from the single-script flow or the batch upload flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Single,
    Batch,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Single => "single",
            JobKind::Batch => "batch",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "single" => Some(JobKind::Single),
            "batch" => Some(JobKind::Batch),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatch strategy, fixed when the job is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPolicy {
    /// One item at a time, in submission order.
    #[default]
    Sequential,
    /// Bounded worker pool; completion order is unspecified.
    #[serde(alias = "parallel")]
    Concurrent,
}

impl std::fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionPolicy::Sequential => f.write_str("sequential"),
            ExecutionPolicy::Concurrent => f.write_str("concurrent"),
        }
    }
}

/// Job status, always derived from item states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

/// A set of items sharing an execution policy and output settings.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub id: String,
    pub kind: JobKind,
    pub policy: ExecutionPolicy,
    pub output: OutputSettings,
    pub created_at: DateTime<Utc>,
    items: Vec<JobItem>,
    completed_at: Option<DateTime<Utc>>,
    cancelled: bool,
}

impl BatchJob {
    pub fn new(
        kind: JobKind,
        policy: ExecutionPolicy,
        output: OutputSettings,
        items: Vec<JobItem>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            policy,
            output,
            created_at: Utc::now(),
            items,
            completed_at: None,
            cancelled: false,
        }
    }

    pub fn items(&self) -> &[JobItem] {
        &self.items
    }

    pub fn item_mut(&mut self, index: usize) -> Option<&mut JobItem> {
        self.items.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Stops further dispatch. Returns false if already cancelled or finished.
    pub fn cancel(&mut self) -> bool {
        if self.cancelled || self.completed_at.is_some() {
            return false;
        }
        self.cancelled = true;
        true
    }

    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status() == status).count()
    }

    /// True once no further transition can happen: every item is terminal,
    /// or the job was cancelled and nothing is still in flight.
    pub fn is_terminal(&self) -> bool {
        if self.items.is_empty() {
            return false;
        }
        if self.items.iter().all(|i| i.status().is_terminal()) {
            return true;
        }
        self.cancelled && self.count(ItemStatus::Processing) == 0
    }

    pub fn status(&self) -> JobStatus {
        if self.is_terminal() {
            if self.cancelled && !self.items.iter().all(|i| i.status().is_terminal()) {
                return JobStatus::Cancelled;
            }
            return JobStatus::Completed;
        }
        if self.items.iter().all(|i| i.status() == ItemStatus::Pending) {
            JobStatus::Pending
        } else {
            JobStatus::Processing
        }
    }

    /// Sets `completed_at` the first time the job is observed terminal.
    /// Returns true only for that first observation.
    pub fn mark_finished(&mut self, now: DateTime<Utc>) -> bool {
        if self.completed_at.is_some() || !self.is_terminal() {
            return false;
        }
        self.completed_at = Some(now);
        true
    }
}
