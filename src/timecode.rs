//! Seconds <-> clock string conversion for subtitle formats.

use crate::error::{Error, Result};

const TRUNCATION_SLACK_MS: f64 = 1e-6;

/// Clock fields of a non-negative seconds offset. Millis are truncated, never rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Clock {
    hours: u64,
    minutes: u64,
    secs: u64,
    millis: u64,
}

impl Clock {
    fn from_seconds(seconds: f64) -> Result<Self> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(Error::InvalidInput(format!(
                "time offset must be a non-negative number of seconds, got {}",
                seconds
            )));
        }
        Ok(Self::truncate(seconds))
    }

    /// Caller guarantees `seconds` is finite and non-negative.
    ///
    /// Truncates to whole milliseconds. The 1ns slack absorbs binary
    /// representation error so `1.001` stays 1001ms instead of 1000ms.
    fn truncate(seconds: f64) -> Self {
        let total_ms = (seconds * 1000.0 + TRUNCATION_SLACK_MS).floor() as u64;
        Self {
            hours: total_ms / 3_600_000,
            minutes: (total_ms % 3_600_000) / 60_000,
            secs: (total_ms % 60_000) / 1_000,
            millis: total_ms % 1_000,
        }
    }

    fn write(&self, separator: Option<char>) -> String {
        match separator {
            Some(sep) => format!(
                "{:02}:{:02}:{:02}{}{:03}",
                self.hours, self.minutes, self.secs, sep, self.millis
            ),
            None => format!("{:02}:{:02}:{:02}", self.hours, self.minutes, self.secs),
        }
    }
}

/// `HH:MM:SS`
pub fn format_clock(seconds: f64) -> Result<String> {
    Ok(Clock::from_seconds(seconds)?.write(None))
}

/// `HH:MM:SS,mmm` (SubRip)
pub fn format_time_srt(seconds: f64) -> Result<String> {
    Ok(Clock::from_seconds(seconds)?.write(Some(',')))
}

/// `HH:MM:SS.mmm` (WebVTT)
pub fn format_time_vtt(seconds: f64) -> Result<String> {
    Ok(Clock::from_seconds(seconds)?.write(Some('.')))
}

/// Infallible variants for values that already passed entry validation.
/// Anything negative or non-finite is clamped to zero.
pub(crate) fn srt_stamp(seconds: f64) -> String {
    Clock::truncate(sanitize(seconds)).write(Some(','))
}

pub(crate) fn vtt_stamp(seconds: f64) -> String {
    Clock::truncate(sanitize(seconds)).write(Some('.'))
}

pub(crate) fn clock_stamp(seconds: f64) -> String {
    Clock::truncate(sanitize(seconds)).write(None)
}

fn sanitize(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}

/// Parse `HH:MM:SS,mmm` or `HH:MM:SS.mmm` into seconds.
///
/// The value is built from whole milliseconds so that formatting the result
/// gives back the same string.
pub fn parse_timestamp(stamp: &str) -> Result<f64> {
    let stamp = stamp.trim();
    let invalid = || Error::InvalidInput(format!("malformed timestamp {:?}", stamp));

    let (clock, millis) = stamp
        .rsplit_once(|c: char| c == ',' || c == '.')
        .ok_or_else(invalid)?;
    let mut fields = clock.split(':');
    let (Some(h), Some(m), Some(s), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(invalid());
    };

    let number = |field: &str| -> Result<u64> {
        if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        field.parse::<u64>().map_err(|_| invalid())
    };
    let (hours, minutes, secs, ms) = (number(h)?, number(m)?, number(s)?, number(millis)?);
    if minutes >= 60 || secs >= 60 || millis.len() != 3 {
        return Err(invalid());
    }

    let total_ms = ((hours * 60 + minutes) * 60 + secs) * 1000 + ms;
    Ok(total_ms as f64 / 1000.0)
}
