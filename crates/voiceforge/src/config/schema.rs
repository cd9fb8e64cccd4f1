use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// Runtime configuration of the generation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on simultaneously processing items of one concurrent job.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Per-attempt gateway timeout.
    #[serde(default = "default_item_timeout_secs")]
    pub item_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cancel_mode: CancelMode,
    #[serde(default)]
    pub limits: UploadLimits,
    /// SQLite file for history. `None` uses the platform default.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_progress_channel_capacity")]
    pub progress_channel_capacity: usize,
    /// Prefix of batch archive download references.
    #[serde(default = "default_download_prefix")]
    pub download_prefix: String,
}

fn default_max_concurrency() -> usize {
    3
}

fn default_item_timeout_secs() -> u64 {
    300
}

fn default_progress_channel_capacity() -> usize {
    100
}

fn default_download_prefix() -> String {
    "generations".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            item_timeout_secs: default_item_timeout_secs(),
            retry: RetryConfig::default(),
            cancel_mode: CancelMode::default(),
            limits: UploadLimits::default(),
            database_path: None,
            progress_channel_capacity: default_progress_channel_capacity(),
            download_prefix: default_download_prefix(),
        }
    }
}

impl PipelineConfig {
    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_secs)
    }

    /// Configured database path, falling back to `~/.voiceforge/data/voiceforge.db`.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(crate::db::default_database_path)
    }
}

/// Gateway retry policy. One attempt means no retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each later one.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    1
}

fn default_initial_backoff_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl RetryConfig {
    /// Backoff before attempt number `attempt` (1-based; the first attempt has none).
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u64 << (attempt - 2).min(16);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

/// What happens to in-flight items when a job is cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelMode {
    /// Let running gateway calls finish and keep their results.
    #[default]
    FinishInFlight,
    /// Drop running gateway calls and mark their items failed.
    AbandonInFlight,
}

/// Size ceilings per content class, in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadLimits {
    #[serde(default = "default_script_max_bytes")]
    pub script_max_bytes: u64,
    #[serde(default = "default_audio_sample_max_bytes")]
    pub audio_sample_max_bytes: u64,
}

fn default_script_max_bytes() -> u64 {
    10 * MIB
}

fn default_audio_sample_max_bytes() -> u64 {
    50 * MIB
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            script_max_bytes: default_script_max_bytes(),
            audio_sample_max_bytes: default_audio_sample_max_bytes(),
        }
    }
}
