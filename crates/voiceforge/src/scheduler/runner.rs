use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info_span, warn, Instrument};

use crate::config::{CancelMode, PipelineConfig};
use crate::error::SchedulerError;
use crate::gateway::{AudioArtifact, SynthesisError, SynthesisGateway, SynthesisRequest};
use crate::history::{HistoryRecord, HistoryStore};
use crate::job::{BatchJob, ExecutionPolicy, JobKind};
use crate::notify::{JobNotification, NotificationSink};
use crate::progress::JobProgressBroadcaster;
use crate::sanitize;
use crate::validator::text::extract_voice_controls;

use super::state::{ItemReporter, JobState};
use super::JobHandle;

const WORKER_LOST: &str = "worker task ended unexpectedly";

/// Shared collaborators of every scheduler.
#[derive(Clone)]
pub struct SchedulerContext {
    pub gateway: Arc<dyn SynthesisGateway>,
    pub history: Arc<HistoryStore>,
    pub notifier: Arc<dyn NotificationSink>,
    pub broadcaster: JobProgressBroadcaster,
    pub config: Arc<PipelineConfig>,
}

/// Drives one job from submission to its history record.
pub struct Scheduler {
    kind: JobKind,
    policy: ExecutionPolicy,
    state: Arc<JobState>,
    ctx: SchedulerContext,
    cancel: CancellationToken,
    started: AtomicBool,
}

impl Scheduler {
    pub fn new(job: BatchJob, ctx: SchedulerContext) -> Self {
        let kind = job.kind;
        let policy = job.policy;
        let state = JobState::new(job, ctx.broadcaster.clone(), &ctx.config.download_prefix);
        Self {
            kind,
            policy,
            state: Arc::new(state),
            ctx,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    pub fn job_id(&self) -> &str {
        self.state.job_id()
    }

    /// Handle for observing and cancelling the job from elsewhere.
    pub fn handle(&self) -> JobHandle {
        JobHandle::new(Arc::clone(&self.state), self.cancel.clone())
    }

    /// Runs every item, then stores the record and sends one notification.
    ///
    /// # Errors
    /// `SchedulerError::History` if the record could not be stored. The
    /// notification is sent regardless.
    pub async fn run(self: Arc<Self>) -> Result<HistoryRecord, SchedulerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRun(self.job_id().to_string()));
        }
        if self.state.is_empty() {
            return Err(SchedulerError::EmptyJob(self.job_id().to_string()));
        }

        let span = info_span!("batch_job",
            job_id = %self.job_id(),
            kind = %self.kind,
            policy = %self.policy,
            items = self.state.len(),
        );

        async move {
            match self.policy {
                ExecutionPolicy::Sequential => Arc::clone(&self).run_sequential().await,
                ExecutionPolicy::Concurrent => Arc::clone(&self).run_concurrent().await,
            }

            let stranded = self.state.fail_stranded(WORKER_LOST);
            if stranded > 0 {
                error!("{} item(s) lost their worker", stranded);
            }

            let record = self.state.take_record().ok_or_else(|| {
                SchedulerError::Worker("job ended without reaching a terminal state".to_string())
            })?;
            self.finish(record)
        }
        .instrument(span)
        .await
    }

    /// One worker task per item, awaited before the next starts, so a
    /// panicking gateway call fails only its own item.
    async fn run_sequential(self: Arc<Self>) {
        for index in 0..self.state.len() {
            if self.cancel.is_cancelled() {
                break;
            }
            let this = Arc::clone(&self);
            let worker =
                tokio::spawn(async move { this.dispatch_item(index).await }.in_current_span());
            if let Err(e) = worker.await {
                error!("Worker task failed: {}", e);
                self.state.fail_stranded(WORKER_LOST);
            }
        }
    }

    async fn run_concurrent(self: Arc<Self>) {
        let limit = self.ctx.config.max_concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut workers = JoinSet::new();

        for index in 0..self.state.len() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            let this = Arc::clone(&self);
            workers.spawn(
                async move {
                    let _permit = permit;
                    this.dispatch_item(index).await;
                }
                .in_current_span(),
            );
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Worker task failed: {}", e);
            }
        }
    }

    async fn dispatch_item(&self, index: usize) {
        let Some((item_id, request)) = self.state.start_item(index) else {
            return;
        };

        let span = info_span!("dispatch_item",
            item_id = %item_id,
            index,
            name = %sanitize::redact_name(&request.name),
            script = %sanitize::redact_script(&request.text),
            controls = extract_voice_controls(&request.text).len(),
        );

        async {
            let outcome = match self.ctx.config.cancel_mode {
                CancelMode::FinishInFlight => self.synthesize_with_retry(index, &request).await,
                CancelMode::AbandonInFlight => {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => Err(SynthesisError::Cancelled),
                        outcome = self.synthesize_with_retry(index, &request) => outcome,
                    }
                }
            };

            match &outcome {
                Ok(_) => debug!("Item completed"),
                Err(e) => warn!("Item failed: {}", e),
            }
            self.state.finish_item(index, outcome);
        }
        .instrument(span)
        .await
    }

    async fn synthesize_with_retry(
        &self,
        index: usize,
        request: &SynthesisRequest,
    ) -> Result<AudioArtifact, SynthesisError> {
        let retry = &self.ctx.config.retry;
        let max_attempts = retry.max_attempts.max(1);
        let timeout = self.ctx.config.item_timeout();
        let reporter = ItemReporter::new(Arc::clone(&self.state), index);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let backoff = retry.backoff_before(attempt);
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }
            self.state.record_attempt(index);

            let outcome =
                match tokio::time::timeout(timeout, self.ctx.gateway.synthesize(request, &reporter))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(SynthesisError::Timeout(timeout.as_secs())),
                };

            match outcome {
                Ok(artifact) => return Ok(artifact),
                Err(e) if attempt < max_attempts && !self.cancel.is_cancelled() => {
                    warn!(attempt, "Attempt failed, retrying: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn finish(&self, record: HistoryRecord) -> Result<HistoryRecord, SchedulerError> {
        let mut notification = JobNotification::new(record.clone(), self.state.snapshot());

        let stored = self.ctx.history.append(record.clone());
        if let Err(ref e) = stored {
            error!("Failed to store history for job {}: {}", record.job_id, e);
            notification.history_error = Some(e.to_string());
        }

        self.ctx.notifier.notify(&notification);
        stored?;
        Ok(record)
    }
}
