//! Plain text transcript, one entry per line, no timing.

use crate::timeline::SubtitleEntry;

pub fn encode_txt(entries: &[SubtitleEntry]) -> String {
    entries
        .iter()
        .map(|e| e.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
