//! Per-job mutable state behind one mutex.
//!
//! Every item transition and the terminal check happen under the same lock,
//! so exactly one caller observes the job becoming terminal. The lock is
//! never held across an await point.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use crate::gateway::{AudioArtifact, ItemProgress, SynthesisError, SynthesisRequest};
use crate::history::HistoryRecord;
use crate::job::{BatchJob, ItemStatus, JobItem, JobStatus};
use crate::progress::{
    snapshot, JobProgress, JobProgressBroadcaster, ProgressEvent, ProgressEventKind,
    ProgressSnapshot,
};

struct Inner {
    job: BatchJob,
    /// Built once, when the job first becomes terminal.
    record: Option<HistoryRecord>,
    record_taken: bool,
}

pub struct JobState {
    job_id: String,
    inner: Mutex<Inner>,
    broadcaster: JobProgressBroadcaster,
    download_prefix: String,
}

impl JobState {
    pub fn new(job: BatchJob, broadcaster: JobProgressBroadcaster, download_prefix: &str) -> Self {
        Self {
            job_id: job.id.clone(),
            inner: Mutex::new(Inner {
                job,
                record: None,
                record_taken: false,
            }),
            broadcaster,
            download_prefix: download_prefix.to_string(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job state lock for {} was poisoned, recovering", self.job_id);
                poisoned.into_inner()
            }
        }
    }

    fn emit(&self, job: &BatchJob, kind: ProgressEventKind, item: Option<&JobItem>) {
        let mut event = ProgressEvent::job(&self.job_id, kind, job.status(), snapshot(job));
        if let Some(item) = item {
            event.item_id = Some(item.id.clone());
            event.item_status = Some(item.status());
            event.item_progress = Some(item.progress_percent());
            event.error = item.error().map(|e| e.to_string());
        }
        self.broadcaster.send(event);
    }

    /// Sets `completed_at` and builds the record if this is the first
    /// observation of a terminal job.
    fn finalize_if_terminal(&self, inner: &mut Inner) -> bool {
        if !inner.job.mark_finished(Utc::now()) {
            return false;
        }
        let record = HistoryRecord::from_job(&inner.job, &self.download_prefix);
        log::info!(
            "Job {} finished with status {} ({} ok, {} failed, {} skipped)",
            self.job_id,
            record.status,
            record.succeeded_count,
            record.failed_count,
            record.skipped_count
        );
        inner.record = Some(record);
        self.emit(&inner.job, ProgressEventKind::JobFinished, None);
        true
    }

    pub fn len(&self) -> usize {
        self.lock().job.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().job.is_empty()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        snapshot(&self.lock().job)
    }

    pub fn status(&self) -> JobStatus {
        self.lock().job.status()
    }

    pub fn progress(&self) -> JobProgress {
        JobProgress::from_job(&self.lock().job)
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().job.is_cancelled()
    }

    /// `Pending → Processing` for the item at `index`.
    ///
    /// Returns the item id and request, or `None` if the job was cancelled
    /// or the item is not pending.
    pub fn start_item(&self, index: usize) -> Option<(String, Arc<SynthesisRequest>)> {
        let mut inner = self.lock();
        if inner.job.is_cancelled() {
            return None;
        }
        let item = inner.job.item_mut(index)?;
        if let Err(e) = item.start(Utc::now()) {
            log::warn!("Not dispatching: {}", e);
            return None;
        }
        let started = (item.id.clone(), Arc::clone(&item.source));
        let job = &inner.job;
        self.emit(job, ProgressEventKind::ItemStarted, job.items().get(index));
        Some(started)
    }

    /// Counts one gateway attempt for the item.
    pub fn record_attempt(&self, index: usize) -> u32 {
        let mut inner = self.lock();
        match inner.job.item_mut(index).map(|item| item.record_attempt()) {
            Some(Ok(n)) => n,
            Some(Err(e)) => {
                log::warn!("Attempt not recorded: {}", e);
                0
            }
            None => 0,
        }
    }

    /// `Processing → Processing` with a new percentage. Ignored once the
    /// item has left `Processing`.
    pub fn report_progress(&self, index: usize, percent: u8) {
        let mut inner = self.lock();
        let Some(item) = inner.job.item_mut(index) else {
            return;
        };
        if item.set_progress(percent).is_err() {
            return;
        }
        let job = &inner.job;
        self.emit(job, ProgressEventKind::ItemProgress, job.items().get(index));
    }

    /// `Processing → Completed | Failed`, then the terminal check.
    ///
    /// Returns true if this call made the job terminal.
    pub fn finish_item(
        &self,
        index: usize,
        outcome: Result<AudioArtifact, SynthesisError>,
    ) -> bool {
        let mut inner = self.lock();
        let now = Utc::now();
        let Some(item) = inner.job.item_mut(index) else {
            return false;
        };

        let (applied, kind) = match outcome {
            Ok(artifact) => (item.complete(artifact, now), ProgressEventKind::ItemCompleted),
            Err(e) => (item.fail(e.to_string(), now), ProgressEventKind::ItemFailed),
        };
        if let Err(e) = applied {
            log::warn!("Ignoring late result: {}", e);
            return false;
        }

        let job = &inner.job;
        self.emit(job, kind, job.items().get(index));
        self.finalize_if_terminal(&mut inner)
    }

    /// Stops further dispatch. Finalizes right away when nothing is in flight.
    ///
    /// Returns false if the job was already cancelled or finished.
    pub fn cancel(&self) -> bool {
        let mut inner = self.lock();
        if !inner.job.cancel() {
            return false;
        }
        log::info!("Job {} cancelled", self.job_id);
        self.emit(&inner.job, ProgressEventKind::JobCancelled, None);
        self.finalize_if_terminal(&mut inner);
        true
    }

    /// Fails every item still `Processing`. Used after all workers have
    /// ended, so anything left there lost its worker.
    pub fn fail_stranded(&self, reason: &str) -> usize {
        let stranded: Vec<usize> = {
            let inner = self.lock();
            inner
                .job
                .items()
                .iter()
                .enumerate()
                .filter(|(_, item)| item.status() == ItemStatus::Processing)
                .map(|(i, _)| i)
                .collect()
        };
        for &index in &stranded {
            self.finish_item(index, Err(SynthesisError::Gateway(reason.to_string())));
        }
        stranded.len()
    }

    /// Hands out the final record once.
    pub fn take_record(&self) -> Option<HistoryRecord> {
        let mut inner = self.lock();
        if inner.record_taken {
            return None;
        }
        let record = inner.record.clone();
        if record.is_some() {
            inner.record_taken = true;
        }
        record
    }
}

/// Routes gateway progress reports into the job state.
pub struct ItemReporter {
    state: Arc<JobState>,
    index: usize,
}

impl ItemReporter {
    pub fn new(state: Arc<JobState>, index: usize) -> Self {
        Self { state, index }
    }
}

impl ItemProgress for ItemReporter {
    fn report(&self, percent: u8) {
        self.state.report_progress(self.index, percent.min(100));
    }
}
