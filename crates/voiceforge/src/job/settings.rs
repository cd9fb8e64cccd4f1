//! Voice and output settings shared by jobs, the gateway and history records.

use serde::{Deserialize, Serialize};

use crate::sanitize;

/// Opaque reference to a voice in the external catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceRef(pub String);

impl VoiceRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VoiceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Voice rendering controls passed through to the gateway untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    #[serde(default = "unit")]
    pub speed: f32,
    #[serde(default = "unit")]
    pub pitch: f32,
    #[serde(default = "unit")]
    pub volume: f32,
    #[serde(default = "default_emotion")]
    pub emotion: String,
}

fn unit() -> f32 {
    1.0
}

fn default_emotion() -> String {
    "neutral".to_string()
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            pitch: 1.0,
            volume: 1.0,
            emotion: default_emotion(),
        }
    }
}

/// Container format of generated audio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
    M4a,
    Flac,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::M4a => "m4a",
            AudioFormat::Flac => "flac",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mp3" => Some(AudioFormat::Mp3),
            "wav" => Some(AudioFormat::Wav),
            "m4a" => Some(AudioFormat::M4a),
            "flac" => Some(AudioFormat::Flac),
            _ => None,
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoding quality tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputQuality {
    Standard,
    #[default]
    High,
    Premium,
}

impl OutputQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputQuality::Standard => "standard",
            OutputQuality::High => "high",
            OutputQuality::Premium => "premium",
        }
    }

    /// Target bitrate for lossy formats.
    pub fn bitrate_kbps(&self) -> u32 {
        match self {
            OutputQuality::Standard => 128,
            OutputQuality::High => 256,
            OutputQuality::Premium => 320,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(OutputQuality::Standard),
            "high" => Some(OutputQuality::High),
            "premium" => Some(OutputQuality::Premium),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutputQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How output files of a batch are named.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "pattern")]
pub enum OutputNaming {
    /// Keep the source name (extension replaced).
    #[default]
    Original,
    /// `001`, `002`, ... in submission order.
    Sequential,
    /// Template with `{index}` and `{name}` placeholders.
    Pattern(String),
}

impl OutputNaming {
    /// Builds the output file name for the item at `index` (0-based).
    pub fn output_name(&self, index: usize, source_name: &str, format: AudioFormat) -> String {
        let stem = file_stem(source_name);
        let number = format!("{:03}", index + 1);
        let base = match self {
            OutputNaming::Original => stem.to_string(),
            OutputNaming::Sequential => number,
            OutputNaming::Pattern(pattern) => pattern
                .replace("{index}", &number)
                .replace("{name}", stem),
        };
        format!("{}.{}", base, format.extension())
    }
}

/// Source name without directories or extension. Client paths are never
/// carried into output names.
fn file_stem(source_name: &str) -> &str {
    let name = sanitize::base_name(source_name).unwrap_or("untitled");
    match name.rfind('.') {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    }
}

/// Whether every item of a batch shares the batch voice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceAssignment {
    #[default]
    Same,
    PerItem,
}

/// Output selection made once per job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub format: AudioFormat,
    #[serde(default)]
    pub quality: OutputQuality,
    #[serde(default)]
    pub naming: OutputNaming,
}
