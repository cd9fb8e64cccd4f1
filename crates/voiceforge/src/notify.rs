//! Terminal job notifications.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::history::{HistoryRecord, RecordStatus};
use crate::job::JobKind;
use crate::progress::ProgressSnapshot;

/// How a job ended, from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    AllSucceeded,
    PartiallyFailed,
    Cancelled,
}

impl JobOutcome {
    pub fn from_record(record: &HistoryRecord) -> Self {
        if record.status == RecordStatus::Cancelled {
            JobOutcome::Cancelled
        } else if record.failed_count > 0 {
            JobOutcome::PartiallyFailed
        } else {
            JobOutcome::AllSucceeded
        }
    }
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobOutcome::AllSucceeded => write!(f, "all items succeeded"),
            JobOutcome::PartiallyFailed => write!(f, "some items failed"),
            JobOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Sent exactly once per job, after it becomes terminal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobNotification {
    pub job_id: String,
    pub kind: JobKind,
    pub outcome: JobOutcome,
    pub snapshot: ProgressSnapshot,
    pub record: HistoryRecord,
    /// Set when the record could not be written to history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_error: Option<String>,
}

impl JobNotification {
    pub fn new(record: HistoryRecord, snapshot: ProgressSnapshot) -> Self {
        Self {
            job_id: record.job_id.clone(),
            kind: record.kind,
            outcome: JobOutcome::from_record(&record),
            snapshot,
            record,
            history_error: None,
        }
    }

    /// One-line summary such as `"3 of 4 items generated, 1 failed"`.
    pub fn summary(&self) -> String {
        let r = &self.record;
        let mut text = format!("{} of {} items generated", r.succeeded_count, r.item_count);
        if r.failed_count > 0 {
            text.push_str(&format!(", {} failed", r.failed_count));
        }
        if r.skipped_count > 0 {
            text.push_str(&format!(", {} skipped", r.skipped_count));
        }
        text
    }
}

/// Receiver of terminal notifications. Must not block.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &JobNotification);
}

/// Writes notifications to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, notification: &JobNotification) {
        match notification.outcome {
            JobOutcome::AllSucceeded => tracing::info!(
                job_id = %notification.job_id,
                kind = %notification.kind,
                "Generation finished: {}",
                notification.summary()
            ),
            JobOutcome::PartiallyFailed | JobOutcome::Cancelled => tracing::warn!(
                job_id = %notification.job_id,
                kind = %notification.kind,
                outcome = %notification.outcome,
                "Generation finished: {}",
                notification.summary()
            ),
        }
    }
}

/// Fans notifications out to tokio broadcast subscribers.
#[derive(Clone)]
pub struct BroadcastNotifier {
    sender: Arc<broadcast::Sender<JobNotification>>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobNotification> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(100)
    }
}

impl NotificationSink for BroadcastNotifier {
    fn notify(&self, notification: &JobNotification) {
        // No active receivers is fine
        let _ = self.sender.send(notification.clone());
    }
}

/// Delivers every notification to each inner sink in order.
#[derive(Default, Clone)]
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl NotificationSink for FanoutNotifier {
    fn notify(&self, notification: &JobNotification) {
        for sink in &self.sinks {
            sink.notify(notification);
        }
    }
}
