//! Job execution: dispatch policies, cancellation and finalization.

pub mod runner;
pub mod state;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::job::JobStatus;
use crate::progress::{JobProgress, ProgressSnapshot};

pub use runner::{Scheduler, SchedulerContext};
pub use state::{ItemReporter, JobState};

/// Cheap, cloneable view of a running job.
#[derive(Clone)]
pub struct JobHandle {
    state: Arc<JobState>,
    cancel: CancellationToken,
}

impl JobHandle {
    pub(crate) fn new(state: Arc<JobState>, cancel: CancellationToken) -> Self {
        Self { state, cancel }
    }

    pub fn job_id(&self) -> &str {
        self.state.job_id()
    }

    pub fn progress(&self) -> JobProgress {
        self.state.progress()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.snapshot()
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Stops dispatching new items. Returns false if the job was already
    /// cancelled or finished.
    pub fn cancel(&self) -> bool {
        // State first, so workers woken by the token see the flag.
        let changed = self.state.cancel();
        if changed {
            self.cancel.cancel();
        }
        changed
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
