//! Seam to the remote text-to-speech service.
//!
//! The pipeline treats synthesis as a black box: one async call per item,
//! unknown latency, no idempotence guarantee.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::settings::{AudioFormat, OutputQuality, VoiceRef, VoiceSettings};

/// Everything the gateway needs to render one item.
///
/// Admitted items hold this behind an `Arc`, so the script text is stored
/// once no matter how many views of the job exist.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    /// Display name of the source (file name or a generated label).
    pub name: String,
    pub text: String,
    pub voice: VoiceRef,
    pub settings: VoiceSettings,
    pub format: AudioFormat,
    pub quality: OutputQuality,
}

/// Descriptor of a rendered audio file returned by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioArtifact {
    /// Where the audio can be downloaded from.
    pub download_ref: String,
    pub format: AudioFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

/// Why a single item failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    #[error("synthesis failed: {0}")]
    Gateway(String),

    #[error("synthesis timed out after {0}s")]
    Timeout(u64),

    #[error("cancelled")]
    Cancelled,
}

/// Incremental progress reported by the gateway while an item renders.
pub trait ItemProgress: Send + Sync {
    /// Reports completion percentage in `0..=100`. Values above 100 are clamped.
    fn report(&self, percent: u8);
}

/// Discards progress reports.
pub struct NoopProgress;

impl ItemProgress for NoopProgress {
    fn report(&self, _percent: u8) {}
}

/// The remote synthesis service.
#[async_trait]
pub trait SynthesisGateway: Send + Sync {
    /// Converts one request to audio.
    ///
    /// # Errors
    /// Returns `SynthesisError::Gateway` when the service rejects or fails
    /// the request.
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        progress: &dyn ItemProgress,
    ) -> Result<AudioArtifact, SynthesisError>;
}
