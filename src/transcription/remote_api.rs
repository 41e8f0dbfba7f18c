//! OpenAI-compatible transcription API backend (Voxtral, open-asr-server, etc.)

use super::audio::AudioInput;
use super::backend::{BackendError, RecognizedSegment, SpeechRecognizer};
use crate::config::RemoteConfig;
use async_trait::async_trait;
use serde::Deserialize;

/// Configuration for remote transcription API.
#[derive(Debug, Clone)]
pub struct RemoteTranscriptionConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl RemoteTranscriptionConfig {
    pub fn new(base_url: String, model: String, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim().to_string(),
            model,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }
}

impl From<&RemoteConfig> for RemoteTranscriptionConfig {
    fn from(config: &RemoteConfig) -> Self {
        Self::new(config.base_url.clone(), config.model.clone(), config.api_key.clone())
    }
}

pub struct RemoteApiBackend {
    config: RemoteTranscriptionConfig,
    client: reqwest::Client,
}

impl RemoteApiBackend {
    pub fn new(config: RemoteTranscriptionConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Option<Vec<VerboseSegment>>,
}

#[derive(Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    avg_logprob: Option<f64>,
}

/// Segments of a `verbose_json` response. Servers that only return `text`
/// yield one segment spanning the whole audio.
pub(crate) fn parse_verbose_json(
    json: &str,
    audio_duration: f64,
) -> Result<Vec<RecognizedSegment>, BackendError> {
    let body: VerboseTranscription =
        serde_json::from_str(json).map_err(|e| BackendError::Output(e.to_string()))?;
    match body.segments {
        Some(segments) => Ok(segments
            .into_iter()
            .map(|s| RecognizedSegment {
                start: s.start,
                end: s.end,
                text: s.text,
                avg_logprob: s.avg_logprob,
            })
            .collect()),
        None if body.text.trim().is_empty() => Ok(Vec::new()),
        None => Ok(vec![RecognizedSegment {
            start: 0.0,
            end: audio_duration,
            text: body.text,
            avg_logprob: None,
        }]),
    }
}

#[async_trait]
impl SpeechRecognizer for RemoteApiBackend {
    fn id(&self) -> &'static str {
        "openai-compatible"
    }

    fn name(&self) -> &'static str {
        "OpenAI-compatible API"
    }

    fn is_available(&self) -> bool {
        !self.config.base_url.is_empty() && !self.config.model.trim().is_empty()
    }

    /// POSTs to base_url (the full endpoint, e.g. http://localhost:8000/v1/audio/transcriptions).
    async fn transcribe(
        &self,
        audio: &AudioInput,
        language: &str,
    ) -> Result<Vec<RecognizedSegment>, BackendError> {
        if !self.is_available() {
            return Err(BackendError::Unavailable("no remote endpoint configured".into()));
        }
        let bytes = tokio::fs::read(audio.path()).await?;
        let file_name = audio
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("language", language.to_string())
            .text("response_format", "verbose_json");

        let mut req = self.client.post(&self.config.base_url).multipart(form);
        if let Some(ref key) = self.config.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api { status, body });
        }
        let body = response.text().await?;
        parse_verbose_json(&body, audio.duration())
    }
}
