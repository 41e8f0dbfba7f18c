//! Speech recognizer trait and types.

use super::audio::AudioInput;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One timed unit of recognizer output, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    /// Average token log-probability, when the recognizer reports one.
    pub avg_logprob: Option<f64>,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("recognizer unavailable: {0}")]
    Unavailable(String),

    #[error("recognizer process failed: {0}")]
    Process(String),

    #[error("unexpected recognizer output: {0}")]
    Output(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A speech-to-text engine: 16 kHz mono audio plus a language code in,
/// time-ordered segments out.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn is_available(&self) -> bool;
    async fn transcribe(
        &self,
        audio: &AudioInput,
        language: &str,
    ) -> Result<Vec<RecognizedSegment>, BackendError>;
}
