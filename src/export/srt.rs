//! SRT (SubRip) subtitle format writer and reader.

use super::Cue;
use crate::error::{Error, Result};
use crate::timecode::{parse_timestamp, srt_stamp};
use crate::timeline::SubtitleEntry;

pub fn encode_srt(entries: &[SubtitleEntry]) -> String {
    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            srt_stamp(entry.start_time),
            srt_stamp(entry.end_time),
            entry.text
        ));
    }
    out
}

/// Parse an SRT document into cues.
///
/// Accepts a UTF-8 BOM, CRLF line endings, missing index lines, `.` as the
/// millisecond separator and trailing cue coordinates after the end stamp.
pub fn decode_srt(input: &str) -> Result<Vec<Cue>> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut lines = input.lines().enumerate().map(|(i, l)| (i + 1, l)).peekable();
    let mut cues = Vec::new();

    while let Some((line_no, line)) = lines.next() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (timing_no, timing) = if line.contains("-->") {
            (line_no, line.to_string())
        } else {
            line.parse::<usize>().map_err(|_| Error::Parse {
                line: line_no,
                message: format!("expected cue index, found {:?}", line),
            })?;
            match lines.next() {
                Some((n, l)) => (n, l.trim().to_string()),
                None => {
                    return Err(Error::Parse {
                        line: line_no,
                        message: "cue index without timing line".to_string(),
                    })
                }
            }
        };
        let (start_time, end_time) = parse_timing(timing_no, &timing)?;

        let mut text_lines = Vec::new();
        while let Some((_, l)) = lines.peek() {
            if l.trim().is_empty() {
                break;
            }
            text_lines.push(*l);
            lines.next();
        }

        cues.push(Cue {
            start_time,
            end_time,
            text: text_lines.join("\n"),
        });
    }

    Ok(cues)
}

fn parse_timing(line_no: usize, line: &str) -> Result<(f64, f64)> {
    let parse_err = |message: String| Error::Parse {
        line: line_no,
        message,
    };
    let (start, rest) = line
        .split_once("-->")
        .ok_or_else(|| parse_err(format!("expected timing line, found {:?}", line)))?;
    let end = rest.split_whitespace().next().unwrap_or("");
    let start = parse_timestamp(start).map_err(|e| parse_err(e.to_string()))?;
    let end = parse_timestamp(end).map_err(|e| parse_err(e.to_string()))?;
    Ok((start, end))
}
