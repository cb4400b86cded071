use tracing::{debug, info};

use crate::config::CorrectionsConfig;

/// One ordered substitution: every case-insensitive occurrence of `pattern`
/// is replaced with the exact-case `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionRule {
    pub pattern: String,
    pub replacement: String,
}

/// Applies a fixed dictionary of phrase substitutions to a raw transcript.
///
/// Speech recognition regularly mishears domain terms ("bit" for "BIET"),
/// so finalized transcripts pass through this dictionary before the user is
/// asked to confirm them.
///
/// Rules are applied in registration order over the progressively rewritten
/// string, so a later rule may match text introduced by an earlier rule.
/// That sequencing is part of the contract and is pinned by tests.
///
/// Matching is ASCII-case-insensitive; rule patterns are plain ASCII domain
/// terms. Unmatched text passes through unchanged, including whitespace and
/// punctuation.
#[derive(Debug, Clone, Default)]
pub struct TranscriptCorrector {
    rules: Vec<CorrectionRule>,
}

impl TranscriptCorrector {
    /// Creates a corrector with the given rules, preserving their order
    #[must_use]
    pub fn new(rules: Vec<CorrectionRule>) -> Self {
        Self { rules }
    }

    /// Builds a corrector from config; disabled corrections yield an empty
    /// rule set (every transcript passes through unchanged)
    #[must_use]
    pub fn from_config(config: &CorrectionsConfig) -> Self {
        if !config.enabled {
            debug!("corrections disabled, transcripts pass through");
            return Self::default();
        }

        let rules = config
            .rules
            .iter()
            .map(|rule| CorrectionRule {
                pattern: rule.pattern.clone(),
                replacement: rule.replacement.clone(),
            })
            .collect();

        Self { rules }
    }

    /// Applies all rules to `text` and returns the corrected transcript
    #[must_use]
    pub fn correct(&self, text: &str) -> String {
        let mut corrected = text.to_owned();

        for rule in &self.rules {
            corrected = replace_all_ignore_ascii_case(&corrected, &rule.pattern, &rule.replacement);
        }

        if corrected == text {
            debug!(text = text, "no correction applied");
        } else {
            info!(original = text, corrected = %corrected, "transcript corrected");
        }

        corrected
    }
}

/// Replaces every ASCII-case-insensitive occurrence of `pattern` in `text`
/// with `replacement`, scanning left to right without rescanning replaced
/// output for the same rule.
fn replace_all_ignore_ascii_case(text: &str, pattern: &str, replacement: &str) -> String {
    if pattern.is_empty() || pattern.len() > text.len() {
        return text.to_owned();
    }

    let bytes = text.as_bytes();
    let pattern_bytes = pattern.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut idx = 0;

    while idx < bytes.len() {
        if bytes.len() - idx >= pattern_bytes.len()
            && bytes[idx..idx + pattern_bytes.len()].eq_ignore_ascii_case(pattern_bytes)
        {
            out.push_str(replacement);
            idx += pattern_bytes.len();
            continue;
        }

        // Copy the next char verbatim. A case-insensitive match against an
        // ASCII pattern only ever consumes ASCII bytes, so `idx` always
        // lands on a char boundary.
        if let Some(ch) = text[idx..].chars().next() {
            out.push(ch);
            idx += ch.len_utf8();
        } else {
            break;
        }
    }

    out
}
