//! Progress broadcaster for real-time job status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::job::{ItemStatus, JobStatus};
use crate::progress::aggregate::ProgressSnapshot;

/// What changed.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEventKind {
    ItemStarted,
    ItemProgress,
    ItemCompleted,
    ItemFailed,
    JobCancelled,
    JobFinished,
}

impl std::fmt::Display for ProgressEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressEventKind::ItemStarted => write!(f, "Item started"),
            ProgressEventKind::ItemProgress => write!(f, "Item progress"),
            ProgressEventKind::ItemCompleted => write!(f, "Item completed"),
            ProgressEventKind::ItemFailed => write!(f, "Item failed"),
            ProgressEventKind::JobCancelled => write!(f, "Job cancelled"),
            ProgressEventKind::JobFinished => write!(f, "Job finished"),
        }
    }
}

/// Progress event for a job, carrying the snapshot taken right after the change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: String,
    pub kind: ProgressEventKind,
    pub job_status: JobStatus,
    pub snapshot: ProgressSnapshot,
    /// Set for item-level events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_status: Option<ItemStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_progress: Option<u8>,
    /// Error message (set on item failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn job(
        job_id: &str,
        kind: ProgressEventKind,
        job_status: JobStatus,
        snapshot: ProgressSnapshot,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            kind,
            job_status,
            snapshot,
            item_id: None,
            item_status: None,
            item_progress: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn percent(&self) -> f64 {
        self.snapshot.percent()
    }
}

/// Broadcasts progress events to any number of subscribers.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<ProgressEvent>>,
}

impl JobProgressBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: ProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Slow subscribers see `RecvError::Lagged` and skip ahead; the job
    /// never waits on them.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(job_id: &str) -> ProgressEvent {
        let snapshot = ProgressSnapshot {
            total: 2,
            pending: 1,
            processing: 0,
            completed: 1,
            failed: 0,
        };
        ProgressEvent::job(
            job_id,
            ProgressEventKind::ItemCompleted,
            JobStatus::Processing,
            snapshot,
        )
    }

    #[test]
    fn test_send_without_subscribers() {
        let broadcaster = JobProgressBroadcaster::new(10);
        broadcaster.send(event("job-1"));
        assert_eq!(broadcaster.receiver_count(), 0);
    }

    #[test]
    fn test_send_receive() {
        let broadcaster = JobProgressBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        broadcaster.send(event("job-1"));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.job_id, "job-1");
        assert_eq!(received.kind, ProgressEventKind::ItemCompleted);
        assert_eq!(received.percent(), 50.0);
    }

    #[test]
    fn test_slow_subscriber_lags() {
        let broadcaster = JobProgressBroadcaster::new(2);
        let mut rx = broadcaster.subscribe();
        for i in 0..5 {
            broadcaster.send(event(&format!("job-{}", i)));
        }
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));
        assert_eq!(rx.try_recv().unwrap().job_id, "job-3");
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(event("job-9")).unwrap();
        assert_eq!(json["jobId"], "job-9");
        assert_eq!(json["kind"], "item_completed");
        assert!(json.get("error").is_none());
    }
}
