use std::path::PathBuf;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::validator::AdmissionError;

#[derive(Error, Debug)]
pub enum VoiceforgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Admission error: {0}")]
    Admission(#[from] AdmissionError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("History already holds a record for job '{0}'")]
    Duplicate(String),

    #[error("History storage failed: {0}")]
    Storage(#[from] DatabaseError),
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Job '{0}' has already been run")]
    AlreadyRun(String),

    #[error("Job '{0}' has no items")]
    EmptyJob(String),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("Failed to record job in history: {0}")]
    History(#[from] HistoryError),
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("No items were admitted ({} rejected)", .0.len())]
    NothingAdmitted(Vec<crate::service::Rejection>),

    #[error("Submission contains no items")]
    EmptySubmission,

    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("Unknown job '{0}'")]
    UnknownJob(String),

    #[error("Job '{job_id}' failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("Jobs can only be submitted from within a tokio runtime")]
    NoRuntime,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("Failed to bridge log records into tracing: {0}")]
    LogBridge(#[from] log::SetLoggerError),
}

pub type Result<T> = std::result::Result<T, VoiceforgeError>;
