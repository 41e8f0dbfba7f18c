//! Project status state machine.
//!
//! ```text
//! uploading --JobDispatched--> processing --TranscriptionSucceeded--> completed
//!     |                            |
//!     +----------Failure-----------+--> failed
//! ```
//! `completed` and `failed` are terminal. Failing an already failed project
//! is accepted so the failure write can be retried.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Uploading,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    JobDispatched,
    TranscriptionSucceeded,
    Failure,
}

/// Timeline access a caller asks for; gated by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineAccess {
    /// Bulk load of recognizer output.
    Load,
    /// split / merge / update / insert / delete.
    Edit,
    /// Snapshot for export or burn-in.
    Export,
}

impl ProjectStatus {
    pub fn apply(self, event: LifecycleEvent) -> Result<ProjectStatus> {
        use LifecycleEvent::*;
        use ProjectStatus::*;

        match (self, event) {
            (Uploading, JobDispatched) => Ok(Processing),
            (Processing, TranscriptionSucceeded) => Ok(Completed),
            (Uploading | Processing | Failed, Failure) => Ok(Failed),
            (from, event) => Err(Error::InvalidState(format!(
                "cannot apply {:?} to a project that is {}",
                event, from
            ))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Failed)
    }

    pub fn is_processing(self) -> bool {
        matches!(self, ProjectStatus::Uploading | ProjectStatus::Processing)
    }

    pub fn is_completed(self) -> bool {
        self == ProjectStatus::Completed
    }

    pub fn permits(self, access: TimelineAccess) -> bool {
        match access {
            TimelineAccess::Load => self == ProjectStatus::Processing,
            TimelineAccess::Edit | TimelineAccess::Export => self == ProjectStatus::Completed,
        }
    }

    pub fn require(self, access: TimelineAccess) -> Result<()> {
        if self.permits(access) {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "subtitles cannot be {} while the project is {}",
                match access {
                    TimelineAccess::Load => "loaded",
                    TimelineAccess::Edit => "edited",
                    TimelineAccess::Export => "exported",
                },
                self
            )))
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProjectStatus::Uploading => "uploading",
            ProjectStatus::Processing => "processing",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleEvent::*;
    use ProjectStatus::*;

    #[test]
    fn happy_path() {
        let status = Uploading.apply(JobDispatched).unwrap();
        assert_eq!(status, Processing);
        assert_eq!(status.apply(TranscriptionSucceeded).unwrap(), Completed);
    }

    #[test]
    fn terminal_states_do_not_move() {
        for event in [JobDispatched, TranscriptionSucceeded, Failure] {
            assert!(Completed.apply(event).is_err());
        }
        assert!(Failed.apply(JobDispatched).is_err());
        assert!(Failed.apply(TranscriptionSucceeded).is_err());
        assert!(Completed.is_terminal() && Failed.is_terminal());
    }

    #[test]
    fn failure_is_idempotent() {
        assert_eq!(Processing.apply(Failure).unwrap(), Failed);
        assert_eq!(Uploading.apply(Failure).unwrap(), Failed);
        assert_eq!(Failed.apply(Failure).unwrap(), Failed);
    }

    #[test]
    fn cannot_skip_processing() {
        assert!(matches!(
            Uploading.apply(TranscriptionSucceeded),
            Err(Error::InvalidState(_))
        ));
        assert!(Processing.apply(JobDispatched).is_err());
    }

    #[test]
    fn gating() {
        assert!(Processing.permits(TimelineAccess::Load));
        assert!(!Completed.permits(TimelineAccess::Load));
        assert!(Completed.permits(TimelineAccess::Edit));
        assert!(!Processing.permits(TimelineAccess::Edit));
        assert!(!Failed.permits(TimelineAccess::Export));
        let err = Uploading.require(TimelineAccess::Edit).unwrap_err();
        assert_eq!(err.to_string(), "subtitles cannot be edited while the project is uploading");
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Processing).unwrap(), "\"processing\"");
        assert!(Uploading.is_processing() && Processing.is_processing());
        assert!(Completed.is_completed());
    }
}
