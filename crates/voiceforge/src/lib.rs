pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod history;
pub mod job;
pub mod logging;
pub mod notify;
pub mod progress;
pub mod sanitize;
pub mod scheduler;
pub mod service;
pub mod validator;

pub use config::{load_config, CancelMode, PipelineConfig, RetryConfig, UploadLimits};
pub use error::{
    ConfigError, HistoryError, LoggingError, Result, SchedulerError, ServiceError,
    VoiceforgeError,
};
pub use gateway::{AudioArtifact, ItemProgress, SynthesisError, SynthesisGateway, SynthesisRequest};
pub use history::{HistoryFilter, HistoryRecord, HistoryStore, RecordStatus};
pub use job::{
    AudioFormat, BatchJob, ExecutionPolicy, ItemStatus, JobItem, JobKind, JobStatus,
    OutputNaming, OutputQuality, OutputSettings, VoiceAssignment, VoiceRef, VoiceSettings,
};
pub use logging::LogFormat;
pub use notify::{BroadcastNotifier, JobNotification, JobOutcome, LogNotifier, NotificationSink};
pub use progress::{JobProgress, JobProgressBroadcaster, ProgressEvent, ProgressSnapshot};
pub use scheduler::{JobHandle, Scheduler, SchedulerContext};
pub use service::{BatchSubmission, GenerationService, Rejection, SubmitReceipt, SubmittedItem};
pub use validator::{AdmissionError, ContentClass, ItemValidator, Upload};
