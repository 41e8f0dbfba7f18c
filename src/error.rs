//! Error taxonomy shared by every module.

use crate::timeline::EntryId;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A field value was rejected (empty text, bad time range, ...).
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Split time must be between start and end time")]
    InvalidRange { start: f64, end: f64, split_at: f64 },

    #[error("No next subtitle to merge with")]
    NoSuccessor,

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Subtitle entry {0} not found")]
    EntryNotFound(EntryId),

    #[error("Project {0} not found")]
    ProjectNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The project status does not allow the requested operation.
    #[error("{0}")]
    InvalidState(String),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Media tool error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not record failure of project {project}: {write_error} (job error: {job_error})")]
    StatusWriteFailed {
        project: String,
        job_error: String,
        write_error: String,
    },

    #[error("Project state lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            field,
            message: message.into(),
        }
    }

    /// True for errors that mean "the id does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::EntryNotFound(_) | Error::ProjectNotFound(_))
    }
}
