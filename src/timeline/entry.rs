//! A single timed caption and the values used to create or patch one.

use crate::error::{Error, Result};
use crate::timecode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timeline-local entry id. Assigned in creation order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntryId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(EntryId)
            .map_err(|_| Error::InvalidInput(format!("invalid entry id {:?}", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    pub id: EntryId,
    /// Seconds from the start of the video.
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub language: String,
    /// Average log-probability reported by the recognizer. Not a probability
    /// and not rescaled; `None` for manual entries or when not reported.
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub is_edited: bool,
}

impl SubtitleEntry {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// `HH:MM:SS`
    pub fn formatted_start_time(&self) -> String {
        timecode::clock_stamp(self.start_time)
    }

    /// `HH:MM:SS`
    pub fn formatted_end_time(&self) -> String {
        timecode::clock_stamp(self.end_time)
    }

    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        self.start_time < end && start < self.end_time
    }
}

/// Entry content before it receives an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub language: String,
    pub confidence: Option<f64>,
}

/// Field changes for `Timeline::update`. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryPatch {
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub text: Option<String>,
    pub language: Option<String>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.start_time.is_none()
            && self.end_time.is_none()
            && self.text.is_none()
            && self.language.is_none()
    }
}

pub(crate) fn validate_time(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::validation(field, "Time must be a finite number"));
    }
    if value < 0.0 {
        return Err(Error::validation(field, "Times cannot be negative"));
    }
    Ok(())
}

pub(crate) fn validate_range(start: f64, end: f64) -> Result<()> {
    validate_time("start_time", start)?;
    validate_time("end_time", end)?;
    if start >= end {
        return Err(Error::validation(
            "start_time",
            "Start time must be before end time",
        ));
    }
    Ok(())
}

/// Returns the trimmed text or a validation error when nothing is left.
pub(crate) fn validate_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("text", "Subtitle text cannot be empty"));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn validate_language(language: &str) -> Result<String> {
    let code = language.trim();
    if code.is_empty() || code.len() > 10 {
        return Err(Error::validation(
            "language",
            "Language must be a short code of 1-10 characters",
        ));
    }
    Ok(code.to_string())
}
