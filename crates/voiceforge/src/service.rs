//! Entry point for the presentation layer.
//!
//! `GenerationService` admits submissions, runs one scheduler per job on the
//! ambient tokio runtime and answers progress and history queries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::config::{validate_config, PipelineConfig};
use crate::error::{ServiceError, VoiceforgeError};
use crate::gateway::{SynthesisGateway, SynthesisRequest};
use crate::history::{HistoryFilter, HistoryRecord, HistoryStore};
use crate::job::{
    BatchJob, ExecutionPolicy, JobItem, JobKind, OutputSettings, VoiceAssignment, VoiceRef,
    VoiceSettings,
};
use crate::notify::NotificationSink;
use crate::progress::{JobProgress, JobProgressBroadcaster, ProgressEvent};
use crate::sanitize;
use crate::scheduler::{JobHandle, Scheduler, SchedulerContext};
use crate::validator::text::{estimate_minutes, prepare_for_synthesis};
use crate::validator::{AdmissionError, ItemValidator, Upload};

/// One script as uploaded or typed by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedItem {
    pub name: String,
    pub text: String,
    #[serde(default)]
    pub declared_type: Option<String>,
    /// Upload size. Defaults to the byte length of `text`.
    #[serde(default)]
    pub size_bytes: Option<u64>,
    /// Used only with `VoiceAssignment::PerItem`.
    #[serde(default)]
    pub voice: Option<VoiceRef>,
    #[serde(default)]
    pub settings: Option<VoiceSettings>,
}

impl SubmittedItem {
    /// A plain-text script.
    pub fn script(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            declared_type: Some("text/plain".to_string()),
            size_bytes: None,
            voice: None,
            settings: None,
        }
    }

    pub fn with_voice(mut self, voice: VoiceRef) -> Self {
        self.voice = Some(voice);
        self
    }
}

/// Everything needed to create a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSubmission {
    pub kind: JobKind,
    #[serde(default)]
    pub policy: ExecutionPolicy,
    #[serde(default)]
    pub output: OutputSettings,
    pub voice: VoiceRef,
    #[serde(default)]
    pub voice_assignment: VoiceAssignment,
    #[serde(default)]
    pub settings: VoiceSettings,
    pub items: Vec<SubmittedItem>,
}

impl BatchSubmission {
    /// A single-script job.
    pub fn single(item: SubmittedItem, voice: VoiceRef) -> Self {
        Self {
            kind: JobKind::Single,
            policy: ExecutionPolicy::Sequential,
            output: OutputSettings::default(),
            voice,
            voice_assignment: VoiceAssignment::Same,
            settings: VoiceSettings::default(),
            items: vec![item],
        }
    }

    pub fn batch(items: Vec<SubmittedItem>, voice: VoiceRef, policy: ExecutionPolicy) -> Self {
        Self {
            kind: JobKind::Batch,
            policy,
            output: OutputSettings::default(),
            voice,
            voice_assignment: VoiceAssignment::Same,
            settings: VoiceSettings::default(),
            items,
        }
    }
}

/// A submitted item that was not admitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    /// Position in the submission.
    pub index: usize,
    pub name: String,
    pub error: AdmissionError,
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub job_id: String,
    pub admitted: usize,
    pub rejected: Vec<Rejection>,
    /// Spoken length of the admitted scripts at 150 words per minute.
    pub estimated_minutes: usize,
}

type JobOutcome = Option<Result<HistoryRecord, String>>;

struct ActiveJob {
    handle: JobHandle,
    done: watch::Receiver<JobOutcome>,
}

type Registry = Arc<Mutex<HashMap<String, ActiveJob>>>;

fn lock_registry(jobs: &Mutex<HashMap<String, ActiveJob>>) -> MutexGuard<'_, HashMap<String, ActiveJob>> {
    match jobs.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Job registry lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Removes a job from the registry when its task ends, whether it
/// returned or unwound.
struct RegistryEntry {
    jobs: Registry,
    job_id: String,
}

impl Drop for RegistryEntry {
    fn drop(&mut self) {
        lock_registry(&self.jobs).remove(&self.job_id);
    }
}

pub struct GenerationService {
    validator: ItemValidator,
    ctx: SchedulerContext,
    jobs: Registry,
}

impl GenerationService {
    pub fn new(
        config: PipelineConfig,
        gateway: Arc<dyn SynthesisGateway>,
        history: Arc<HistoryStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self, ServiceError> {
        validate_config(&config)?;

        let broadcaster = JobProgressBroadcaster::new(config.progress_channel_capacity);
        Ok(Self {
            validator: ItemValidator::new(config.limits.clone()),
            ctx: SchedulerContext {
                gateway,
                history,
                notifier,
                broadcaster,
                config: Arc::new(config),
            },
            jobs: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Opens the history database named by `config` and builds the service.
    pub fn open(
        config: PipelineConfig,
        gateway: Arc<dyn SynthesisGateway>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self, VoiceforgeError> {
        let history = match config.resolved_database_path() {
            Some(path) => HistoryStore::open(&path)?,
            None => {
                log::warn!("No home directory found, history will not survive a restart");
                HistoryStore::in_memory()?
            }
        };
        Ok(Self::new(config, gateway, Arc::new(history), notifier)?)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.ctx.config
    }

    pub fn history_store(&self) -> &Arc<HistoryStore> {
        &self.ctx.history
    }

    /// Validates every item, creates a job from the admitted ones and
    /// starts it. Rejected items are listed in the receipt.
    ///
    /// # Errors
    /// `NothingAdmitted` if every item was rejected; no job is created.
    /// `NoRuntime` when called outside a tokio runtime.
    pub fn submit(&self, submission: BatchSubmission) -> Result<SubmitReceipt, ServiceError> {
        let BatchSubmission {
            kind,
            policy,
            output,
            voice,
            voice_assignment,
            settings,
            items,
        } = submission;

        if items.is_empty() {
            return Err(ServiceError::EmptySubmission);
        }
        if kind == JobKind::Single && items.len() != 1 {
            return Err(ServiceError::InvalidSubmission(format!(
                "a single job takes exactly one item, got {}",
                items.len()
            )));
        }
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ServiceError::NoRuntime)?;

        let mut admitted: Vec<JobItem> = Vec::with_capacity(items.len());
        let mut rejected = Vec::new();
        let mut estimated_minutes = 0;

        for (index, item) in items.into_iter().enumerate() {
            let upload = Upload {
                declared_type: item.declared_type.as_deref(),
                file_name: Some(&item.name),
                size_bytes: item.size_bytes.unwrap_or(item.text.len() as u64),
            };
            let text = prepare_for_synthesis(&item.text);
            if let Err(error) = self.validator.validate_script(&upload, &text) {
                log::warn!(
                    "Rejected item {} ({}): {}",
                    index,
                    sanitize::redact_name(&item.name),
                    error
                );
                rejected.push(Rejection {
                    index,
                    name: item.name,
                    error,
                });
                continue;
            }

            estimated_minutes += estimate_minutes(&text);
            let item_voice = match voice_assignment {
                VoiceAssignment::Same => voice.clone(),
                VoiceAssignment::PerItem => item.voice.unwrap_or_else(|| voice.clone()),
            };
            let output_name = output
                .naming
                .output_name(admitted.len(), &item.name, output.format);
            let request = SynthesisRequest {
                name: item.name,
                text,
                voice: item_voice,
                settings: item.settings.unwrap_or_else(|| settings.clone()),
                format: output.format,
                quality: output.quality,
            };
            admitted.push(JobItem::new(Arc::new(request), output_name));
        }

        if admitted.is_empty() {
            return Err(ServiceError::NothingAdmitted(rejected));
        }

        let admitted_count = admitted.len();
        let job = BatchJob::new(kind, policy, output, admitted);
        let scheduler = Arc::new(Scheduler::new(job, self.ctx.clone()));
        let handle = scheduler.handle();
        let job_id = handle.job_id().to_string();

        let (done_tx, done_rx) = watch::channel(None);
        lock_registry(&self.jobs).insert(
            job_id.clone(),
            ActiveJob {
                handle,
                done: done_rx,
            },
        );

        log::info!(
            "Job {} submitted: {} {} item(s), {} rejected, {}",
            job_id,
            admitted_count,
            kind,
            rejected.len(),
            policy
        );

        let entry = RegistryEntry {
            jobs: Arc::clone(&self.jobs),
            job_id: job_id.clone(),
        };
        runtime.spawn(async move {
            let _entry = entry;
            let outcome = scheduler.run().await.map_err(|e| e.to_string());
            let _ = done_tx.send(Some(outcome));
        });

        Ok(SubmitReceipt {
            job_id,
            admitted: admitted_count,
            rejected,
            estimated_minutes,
        })
    }

    /// Live progress of a running job. Finished jobs are in `history`.
    pub fn progress(&self, job_id: &str) -> Option<JobProgress> {
        lock_registry(&self.jobs)
            .get(job_id)
            .map(|job| job.handle.progress())
    }

    /// Ids of jobs that have not finished yet.
    pub fn active_jobs(&self) -> Vec<String> {
        lock_registry(&self.jobs).keys().cloned().collect()
    }

    /// Progress events of every job.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.ctx.broadcaster.subscribe()
    }

    /// Cancels a running job. Returns false if it was already cancelled
    /// or has finished.
    pub fn cancel(&self, job_id: &str) -> Result<bool, ServiceError> {
        let handle = lock_registry(&self.jobs)
            .get(job_id)
            .map(|job| job.handle.clone());
        match handle {
            Some(handle) => Ok(handle.cancel()),
            None if self.ctx.history.get(job_id).is_some() => Ok(false),
            None => Err(ServiceError::UnknownJob(job_id.to_string())),
        }
    }

    /// Waits for a job to finish and returns its record.
    pub async fn wait(&self, job_id: &str) -> Result<HistoryRecord, ServiceError> {
        let done = lock_registry(&self.jobs)
            .get(job_id)
            .map(|job| job.done.clone());

        let Some(mut done) = done else {
            return self
                .ctx
                .history
                .get(job_id)
                .ok_or_else(|| ServiceError::UnknownJob(job_id.to_string()));
        };

        let outcome = match done.wait_for(|outcome| outcome.is_some()).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        match outcome {
            Some(Ok(record)) => Ok(record),
            Some(Err(message)) => Err(ServiceError::JobFailed {
                job_id: job_id.to_string(),
                message,
            }),
            None => Err(ServiceError::JobFailed {
                job_id: job_id.to_string(),
                message: "scheduler stopped without a result".to_string(),
            }),
        }
    }

    pub fn history(&self, filter: HistoryFilter) -> Vec<HistoryRecord> {
        self.ctx.history.list(filter)
    }

    pub fn remove_history(&self, job_id: &str) -> Result<bool, ServiceError> {
        Ok(self.ctx.history.remove(job_id)?)
    }
}
