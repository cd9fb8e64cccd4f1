//! Job-level progress derived from item states.

use serde::{Deserialize, Serialize};

use crate::job::{BatchJob, ItemStatus, JobKind, JobStatus};

/// Item counts by status. Always sums to `total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl ProgressSnapshot {
    /// `(completed + failed) / total * 100`, or 0 for an empty job.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.completed + self.failed) as f64 / self.total as f64 * 100.0
    }

    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Counts items of `job` by status.
pub fn snapshot(job: &BatchJob) -> ProgressSnapshot {
    job.items()
        .iter()
        .fold(ProgressSnapshot::default(), |mut acc, item| {
            acc.total += 1;
            match item.status() {
                ItemStatus::Pending => acc.pending += 1,
                ItemStatus::Processing => acc.processing += 1,
                ItemStatus::Completed => acc.completed += 1,
                ItemStatus::Failed => acc.failed += 1,
            }
            acc
        })
}

/// Per-item line of a progress view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub id: String,
    pub name: String,
    pub output_name: String,
    pub status: ItemStatus,
    pub progress_percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read-only progress view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub job_id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub snapshot: ProgressSnapshot,
    pub percent: f64,
    pub items: Vec<ItemView>,
}

impl JobProgress {
    pub fn from_job(job: &BatchJob) -> Self {
        let snapshot = snapshot(job);
        Self {
            job_id: job.id.clone(),
            kind: job.kind,
            status: job.status(),
            snapshot,
            percent: snapshot.percent(),
            items: job
                .items()
                .iter()
                .map(|item| ItemView {
                    id: item.id.clone(),
                    name: item.name().to_string(),
                    output_name: item.output_name.clone(),
                    status: item.status(),
                    progress_percent: item.progress_percent(),
                    error: item.error().map(|e| e.to_string()),
                })
                .collect(),
        }
    }
}
