//! Script text helpers used at admission time and for display summaries.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Average speaking rate used for duration estimates.
pub const WORDS_PER_MINUTE: usize = 150;

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RE_UNSPEAKABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.,!?;:()\-\[\]]").unwrap());
static RE_VOICE_CONTROL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(PAUSE|EMPHASIS|SPEED:\w+|VOLUME:\w+|PITCH:\w+)\]").unwrap()
});

/// Counts whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Estimated spoken length in whole minutes, rounded up.
pub fn estimate_minutes(text: &str) -> usize {
    word_count(text).div_ceil(WORDS_PER_MINUTE)
}

/// Human label for the estimated spoken length.
pub fn reading_time_label(text: &str) -> String {
    match estimate_minutes(text) {
        0 => "Less than 1 minute".to_string(),
        1 => "1 minute".to_string(),
        n => format!("{} minutes", n),
    }
}

/// Normalizes a script before it is sent for synthesis: drops characters
/// the voices cannot pronounce and collapses runs of whitespace.
pub fn prepare_for_synthesis(text: &str) -> String {
    let stripped = RE_UNSPEAKABLE.replace_all(text, "");
    RE_WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Inline control tag such as `[PAUSE]` or `[SPEED:slow]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceControl {
    /// Tag body without brackets, e.g. `SPEED:slow`.
    pub tag: String,
    /// Byte offset of the opening bracket.
    pub position: usize,
    pub full_match: String,
}

/// Finds all voice control tags in document order.
pub fn extract_voice_controls(text: &str) -> Vec<VoiceControl> {
    RE_VOICE_CONTROL
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let tag = caps.get(1)?;
            Some(VoiceControl {
                tag: tag.as_str().to_string(),
                position: whole.start(),
                full_match: whole.as_str().to_string(),
            })
        })
        .collect()
}

/// Formats a byte count with binary units: `0 Bytes`, `1.5 KB`, `10 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    let formatted = format!("{:.2}", rounded);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}
