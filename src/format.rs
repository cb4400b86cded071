//! Prepares backend replies for speech synthesis.
//!
//! Replies arrive as lightweight markdown; the synthesis capability wants
//! plain sentences. These helpers are consumed when rendering replies, not
//! by the voice pipeline itself.

const SPEAK_KEYWORDS: &[&str] = &[
    "admission",
    "fee",
    "placement",
    "scholarship",
    "hostel",
    "library",
    "course",
    "department",
    "eligibility",
    "important",
    "deadline",
    "application",
    "required",
];

/// Strips markdown emphasis, bracketed/parenthesized asides and newlines so
/// the result reads naturally when spoken
#[must_use]
pub fn speakable_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut skip_until: Option<char> = None;

    for ch in text.chars() {
        if let Some(closer) = skip_until {
            if ch == closer {
                skip_until = None;
            }
            continue;
        }
        match ch {
            '*' => {}
            '[' => skip_until = Some(']'),
            '(' => skip_until = Some(')'),
            '\n' => out.push_str(". "),
            _ => out.push(ch),
        }
    }

    // Collapse runs of whitespace left behind by the stripping
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether a reply carries information worth reading aloud unprompted
#[must_use]
pub fn should_speak(reply: &str) -> bool {
    let lower = reply.to_lowercase();
    SPEAK_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}
