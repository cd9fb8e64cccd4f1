//! Immutable summaries of finished jobs and their row mapping.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::db::history_repo::HistoryRow;
use crate::db::DatabaseError;
use crate::job::{AudioFormat, BatchJob, ItemStatus, JobKind, JobStatus, OutputQuality};

/// Status stored with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Processing,
    Completed,
    Cancelled,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Processing => "processing",
            RecordStatus::Completed => "completed",
            RecordStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how the audio of a job was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDescriptor {
    pub format: AudioFormat,
    pub quality: OutputQuality,
    /// `None` when no item produced audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_ref: Option<String>,
}

/// Summary of one job, owned by the history store once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub job_id: String,
    pub kind: JobKind,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub item_count: u32,
    pub succeeded_count: u32,
    pub failed_count: u32,
    /// Items never dispatched because the job was cancelled.
    pub skipped_count: u32,
    pub output: OutputDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

fn sum_known<I: Iterator<Item = Option<T>>, T: std::iter::Sum<T>>(values: I) -> Option<T> {
    let known: Vec<T> = values.flatten().collect();
    if known.is_empty() {
        None
    } else {
        Some(known.into_iter().sum())
    }
}

impl HistoryRecord {
    /// Summarizes `job` as it stands.
    ///
    /// Batch jobs point at an archive under `download_prefix`; single jobs
    /// point at their one artifact.
    pub fn from_job(job: &BatchJob, download_prefix: &str) -> Self {
        let status = match job.status() {
            JobStatus::Completed => RecordStatus::Completed,
            JobStatus::Cancelled => RecordStatus::Cancelled,
            JobStatus::Pending | JobStatus::Processing => RecordStatus::Processing,
        };
        let artifacts: Vec<_> = job.items().iter().filter_map(|i| i.result()).collect();

        let download_ref = if artifacts.is_empty() {
            None
        } else {
            match job.kind {
                JobKind::Single => artifacts.first().map(|a| a.download_ref.clone()),
                JobKind::Batch => Some(format!(
                    "{}/{}.zip",
                    download_prefix.trim_end_matches('/'),
                    job.id
                )),
            }
        };

        Self {
            job_id: job.id.clone(),
            kind: job.kind,
            status,
            created_at: job.created_at,
            completed_at: job.completed_at(),
            item_count: job.len() as u32,
            succeeded_count: job.count(ItemStatus::Completed) as u32,
            failed_count: job.count(ItemStatus::Failed) as u32,
            skipped_count: job.count(ItemStatus::Pending) as u32,
            output: OutputDescriptor {
                format: job.output.format,
                quality: job.output.quality,
                download_ref,
            },
            size_bytes: sum_known(artifacts.iter().map(|a| a.size_bytes)),
            duration_secs: sum_known(artifacts.iter().map(|a| a.duration_secs)),
        }
    }

    /// Ordering key: completion time, or creation time while unfinished.
    pub fn recency(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.created_at)
    }

    pub fn to_row(&self) -> HistoryRow {
        HistoryRow {
            job_id: self.job_id.clone(),
            kind: self.kind.as_str().to_string(),
            status: self.status.as_str().to_string(),
            created_at: format_timestamp(self.created_at),
            completed_at: self.completed_at.map(format_timestamp),
            item_count: self.item_count,
            succeeded_count: self.succeeded_count,
            failed_count: self.failed_count,
            skipped_count: self.skipped_count,
            format: self.output.format.as_str().to_string(),
            quality: self.output.quality.as_str().to_string(),
            download_ref: self.output.download_ref.clone(),
            size_bytes: self.size_bytes.map(|b| b as i64),
            duration_secs: self.duration_secs,
        }
    }

    pub fn from_row(row: &HistoryRow) -> Result<Self, DatabaseError> {
        let corrupt = |reason: String| DatabaseError::CorruptRow {
            id: row.job_id.clone(),
            reason,
        };

        let kind = JobKind::parse(&row.kind)
            .ok_or_else(|| corrupt(format!("unknown kind '{}'", row.kind)))?;
        let created_at = parse_timestamp(&row.created_at)
            .ok_or_else(|| corrupt(format!("bad created_at '{}'", row.created_at)))?;

        Ok(Self {
            job_id: row.job_id.clone(),
            kind,
            status: parse_status(&row.status, &row.job_id),
            created_at,
            completed_at: row.completed_at.as_deref().and_then(parse_timestamp),
            item_count: row.item_count,
            succeeded_count: row.succeeded_count,
            failed_count: row.failed_count,
            skipped_count: row.skipped_count,
            output: OutputDescriptor {
                format: AudioFormat::parse(&row.format).unwrap_or_else(|| {
                    log::warn!(
                        "Unknown format '{}' for job {}, defaulting to mp3",
                        row.format,
                        row.job_id
                    );
                    AudioFormat::default()
                }),
                quality: OutputQuality::parse(&row.quality).unwrap_or_else(|| {
                    log::warn!(
                        "Unknown quality '{}' for job {}, defaulting to high",
                        row.quality,
                        row.job_id
                    );
                    OutputQuality::default()
                }),
                download_ref: row.download_ref.clone(),
            },
            size_bytes: row.size_bytes.and_then(|b| u64::try_from(b).ok()),
            duration_secs: row.duration_secs,
        })
    }
}

fn parse_status(s: &str, job_id: &str) -> RecordStatus {
    match s {
        "completed" => RecordStatus::Completed,
        "cancelled" => RecordStatus::Cancelled,
        "processing" => RecordStatus::Processing,
        other => {
            log::warn!(
                "Unknown history status '{}' for job {}, defaulting to Processing",
                other,
                job_id
            );
            RecordStatus::Processing
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            None
        }
    }
}

/// Fixed-width UTC so text ordering in SQLite matches time ordering.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// History list filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryFilter {
    #[default]
    All,
    KindSingle,
    KindBatch,
    StatusCompleted,
    StatusProcessing,
}

impl HistoryFilter {
    pub fn matches(&self, record: &HistoryRecord) -> bool {
        match self {
            HistoryFilter::All => true,
            HistoryFilter::KindSingle => record.kind == JobKind::Single,
            HistoryFilter::KindBatch => record.kind == JobKind::Batch,
            HistoryFilter::StatusCompleted => record.status == RecordStatus::Completed,
            HistoryFilter::StatusProcessing => record.status == RecordStatus::Processing,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(HistoryFilter::All),
            "kind_single" | "single" => Some(HistoryFilter::KindSingle),
            "kind_batch" | "batch" => Some(HistoryFilter::KindBatch),
            "status_completed" | "completed" => Some(HistoryFilter::StatusCompleted),
            "status_processing" | "processing" => Some(HistoryFilter::StatusProcessing),
            _ => None,
        }
    }
}
