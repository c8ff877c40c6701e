//! Read-aloud text sanitization.
//!
//! Text that reaches the visually-hidden speech layer gets vocalized by
//! screen readers verbatim. These filters strip what a listener must never
//! hear: control characters, escape-sequence artifacts left by upstream
//! extraction, bare page numbers, table-of-contents leader lines and runs
//! of binary noise.

use crate::model::{BlockType, TextBlock};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Control characters that survive extraction from damaged sources.
    static ref CONTROL: Regex = Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap();
    /// Escape-sequence artifacts such as `\d+` or `\n` leaking into text.
    static ref ESCAPE_ARTIFACT: Regex = Regex::new(r"\\[a-zA-Z]\+?").unwrap();
    /// Character-class artifacts such as `\[a-zA-Z]`.
    static ref CLASS_ARTIFACT: Regex = Regex::new(r"\\\[[a-zA-Z0-9\-]+\]").unwrap();
    /// Bare page number.
    static ref BARE_NUMBER: Regex = Regex::new(r"^\d{1,4}$").unwrap();
    /// Table-of-contents leader dots ("Feeding ....... 12").
    static ref LEADER_DOTS: Regex = Regex::new(r"\.{4,}").unwrap();
}

/// Strip control characters and escape artifacts, collapsing the whitespace
/// the removals leave behind.
pub fn clean_text(text: &str) -> String {
    let no_control = CONTROL.replace_all(text, " ");
    let no_escapes = ESCAPE_ARTIFACT.replace_all(&no_control, " ");
    let no_classes = CLASS_ARTIFACT.replace_all(&no_escapes, " ");
    no_classes.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether a block's text is decoration rather than content: a bare page
/// number, a leader-dot line, or mostly non-alphanumeric noise.
pub fn is_decorative(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || BARE_NUMBER.is_match(trimmed) || LEADER_DOTS.is_match(trimmed) {
        return true;
    }
    if trimmed.len() > 10 {
        let alnum = trimmed.chars().filter(|c| c.is_alphanumeric()).count();
        if (alnum as f32) < 0.3 * trimmed.len() as f32 {
            return true;
        }
    }
    false
}

/// Whether a block belongs in the read-aloud text layer at all.
///
/// Suppressed blocks, footnotes, sidebars and decorative fragments are
/// rendered nowhere near a screen reader's voice.
pub fn is_speakable(block: &TextBlock) -> bool {
    !block.exclude_from_reading_order
        && block.block_type.is_spoken()
        && !is_decorative(&block.text)
}
