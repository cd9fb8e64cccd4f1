//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Scripts are user content. Spans and log lines carry a word count and a
//! short hash instead of the text itself.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::validator::text::word_count;

/// Returns a short deterministic hash of a script for correlating log lines.
pub fn hash_text(text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let hash = hasher.finish();
    format!("{:016x}", hash)
}

/// Describes a script without revealing it: `"<42 words #0123abcd>"`.
pub fn redact_script(text: &str) -> String {
    format!("<{} words #{}>", word_count(text), &hash_text(text)[..8])
}

/// Last component of a user-supplied file name, with either separator.
///
/// Upload names may arrive as full client paths. `None` when nothing
/// follows the last separator.
pub fn base_name(name: &str) -> Option<&str> {
    name.rsplit(['/', '\\']).next().filter(|n| !n.is_empty())
}

/// Strips any directory part from a user-supplied file name.
pub fn redact_name(name: &str) -> String {
    base_name(name).unwrap_or("<unnamed>").to_string()
}
