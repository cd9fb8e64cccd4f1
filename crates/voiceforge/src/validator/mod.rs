//! Admission checks for submitted items.
//!
//! Verdicts depend only on the declared type, the file name and the byte
//! size, so the same upload is always admitted or rejected the same way.

pub mod text;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::UploadLimits;

const SCRIPT_TYPES: &[&str] = &["text/plain", "application/json", "text/csv", "text/markdown"];

const AUDIO_SAMPLE_TYPES: &[&str] = &[
    "audio/wav",
    "audio/x-wav",
    "audio/wave",
    "audio/mpeg",
    "audio/mp3",
    "audio/m4a",
    "audio/x-m4a",
    "audio/mp4",
];

/// Content class an upload is checked against. Each class has its own
/// allow-list and size ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentClass {
    /// Script files fed to synthesis.
    Script,
    /// Reference recordings used elsewhere in the product.
    AudioSample,
}

impl ContentClass {
    fn allowed_types(&self) -> &'static [&'static str] {
        match self {
            ContentClass::Script => SCRIPT_TYPES,
            ContentClass::AudioSample => AUDIO_SAMPLE_TYPES,
        }
    }

    /// Plain-text scripts are recognized by a `.txt` name whatever type the
    /// browser declared for them.
    fn admits_by_name(&self, file_name: Option<&str>) -> bool {
        match self {
            ContentClass::Script => file_name
                .is_some_and(|name| name.to_ascii_lowercase().ends_with(".txt")),
            ContentClass::AudioSample => false,
        }
    }
}

impl std::fmt::Display for ContentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentClass::Script => f.write_str("script"),
            ContentClass::AudioSample => f.write_str("audio sample"),
        }
    }
}

/// Why an item was not admitted.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AdmissionError {
    #[error("unsupported type: '{content_type}' is not accepted for {class} uploads")]
    UnsupportedType {
        content_type: String,
        class: ContentClass,
    },

    #[error("too large: {} exceeds the {} limit", human(.size_bytes), human(.limit_bytes))]
    TooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error("empty script: no text to synthesize")]
    EmptyScript,
}

impl AdmissionError {
    /// Short machine-friendly reason.
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionError::UnsupportedType { .. } => "unsupported type",
            AdmissionError::TooLarge { .. } => "too large",
            AdmissionError::EmptyScript => "empty script",
        }
    }
}

fn human(bytes: &u64) -> String {
    text::format_file_size(*bytes)
}

/// Metadata of an upload as declared by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct Upload<'a> {
    pub declared_type: Option<&'a str>,
    pub file_name: Option<&'a str>,
    pub size_bytes: u64,
}

/// Checks uploads against the configured ceilings and type allow-lists.
#[derive(Debug, Clone)]
pub struct ItemValidator {
    limits: UploadLimits,
}

impl ItemValidator {
    pub fn new(limits: UploadLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    fn ceiling(&self, class: ContentClass) -> u64 {
        match class {
            ContentClass::Script => self.limits.script_max_bytes,
            ContentClass::AudioSample => self.limits.audio_sample_max_bytes,
        }
    }

    /// Validates one upload. Type is checked before size.
    pub fn validate(
        &self,
        class: ContentClass,
        upload: &Upload<'_>,
    ) -> Result<ContentClass, AdmissionError> {
        let content_type = resolve_content_type(upload);
        if !class.allowed_types().contains(&content_type.as_str())
            && !class.admits_by_name(upload.file_name)
        {
            return Err(AdmissionError::UnsupportedType {
                content_type,
                class,
            });
        }

        let limit = self.ceiling(class);
        if upload.size_bytes > limit {
            return Err(AdmissionError::TooLarge {
                size_bytes: upload.size_bytes,
                limit_bytes: limit,
            });
        }

        Ok(class)
    }

    /// Validates a script upload together with its extracted text.
    pub fn validate_script(
        &self,
        upload: &Upload<'_>,
        text: &str,
    ) -> Result<ContentClass, AdmissionError> {
        let class = self.validate(ContentClass::Script, upload)?;
        if text.trim().is_empty() {
            return Err(AdmissionError::EmptyScript);
        }
        Ok(class)
    }
}

/// Declared type without parameters, lowercased. Missing or generic types
/// fall back to a guess from the file name.
fn resolve_content_type(upload: &Upload<'_>) -> String {
    let declared = upload
        .declared_type
        .map(|t| t.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty() && t != "application/octet-stream");

    if let Some(declared) = declared {
        return declared;
    }

    upload
        .file_name
        .and_then(|name| mime_guess::from_path(name).first())
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
