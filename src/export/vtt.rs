//! VTT (WebVTT) subtitle format writer.

use crate::timecode::vtt_stamp;
use crate::timeline::SubtitleEntry;

pub fn encode_vtt(entries: &[SubtitleEntry]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for entry in entries {
        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            vtt_stamp(entry.start_time),
            vtt_stamp(entry.end_time),
            entry.text
        ));
    }
    out
}
