//! Recognized text cleanup
//!
//! Keeps letters, digits and CJK ideographs, drops everything else and
//! collapses whitespace runs to a single space.

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// Everything that is not a letter, digit, Han ideograph or whitespace
const UNICODE_STRIP_PATTERN: &str = r"[^\p{L}\p{N}\p{Han}\s]+";

/// CJK Unified Ideographs block
const CJK_START: char = '\u{4E00}';
const CJK_END: char = '\u{9FFF}';

static SANITIZER: LazyLock<Sanitizer> = LazyLock::new(Sanitizer::new);

/// Character class used to strip recognized text
#[derive(Debug, Clone)]
pub enum Sanitizer {
    /// Unicode property classes
    UnicodeClass(Regex),
    /// ASCII alphanumerics plus the CJK Unified Ideographs block, for builds
    /// without Unicode property support
    Fallback,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitizer {
    /// Use Unicode classes when the regex engine supports them
    pub fn new() -> Self {
        match Regex::new(UNICODE_STRIP_PATTERN) {
            Ok(pattern) => Self::UnicodeClass(pattern),
            Err(e) => {
                warn!("Unicode character classes unavailable, using ASCII/CJK fallback: {}", e);
                Self::Fallback
            }
        }
    }

    pub fn sanitize(&self, raw: &str) -> String {
        let stripped = match self {
            Self::UnicodeClass(pattern) => pattern.replace_all(raw, "").into_owned(),
            Self::Fallback => raw.chars().filter(|c| keep_fallback(*c)).collect(),
        };

        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

fn keep_fallback(c: char) -> bool {
    c.is_ascii_alphanumeric() || (CJK_START..=CJK_END).contains(&c) || c.is_whitespace()
}

/// Sanitize with the process-wide sanitizer
pub fn sanitize(raw: &str) -> String {
    SANITIZER.sanitize(raw)
}
