//! whisper.cpp command-line recognizer.
//!
//! Runs the binary with full JSON output (`-ojf`) and reads segment offsets
//! and token probabilities from the generated file.

use super::audio::AudioInput;
use super::backend::{BackendError, RecognizedSegment, SpeechRecognizer};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub struct WhisperCliBackend {
    pub model_path: PathBuf,
    pub binary_path: String,
}

impl WhisperCliBackend {
    pub fn new(model_path: PathBuf, binary_path: Option<String>) -> Self {
        Self {
            model_path,
            binary_path: binary_path.unwrap_or_else(|| "whisper-cli".to_string()),
        }
    }
}

#[derive(Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    transcription: Vec<WhisperSegment>,
}

#[derive(Deserialize)]
struct WhisperSegment {
    offsets: Offsets,
    text: String,
    #[serde(default)]
    tokens: Vec<WhisperToken>,
}

/// Milliseconds.
#[derive(Deserialize)]
struct Offsets {
    from: u64,
    to: u64,
}

#[derive(Deserialize)]
struct WhisperToken {
    text: String,
    p: f64,
}

/// Mean natural log of the probabilities of the text tokens. Special tokens
/// such as `[_BEG_]` or `[_TT_42]` are skipped.
fn avg_logprob(tokens: &[WhisperToken]) -> Option<f64> {
    let logs: Vec<f64> = tokens
        .iter()
        .filter(|t| !t.text.starts_with("[_") && t.p > 0.0)
        .map(|t| t.p.ln())
        .collect();
    if logs.is_empty() {
        None
    } else {
        Some(logs.iter().sum::<f64>() / logs.len() as f64)
    }
}

pub(crate) fn parse_whisper_json(json: &str) -> Result<Vec<RecognizedSegment>, BackendError> {
    let output: WhisperOutput =
        serde_json::from_str(json).map_err(|e| BackendError::Output(e.to_string()))?;
    Ok(output
        .transcription
        .into_iter()
        .map(|s| RecognizedSegment {
            start: s.offsets.from as f64 / 1000.0,
            end: s.offsets.to as f64 / 1000.0,
            avg_logprob: avg_logprob(&s.tokens),
            text: s.text,
        })
        .collect())
}

fn path_arg(path: &Path) -> Result<&str, BackendError> {
    path.to_str()
        .ok_or_else(|| BackendError::Unavailable(format!("path is not valid UTF-8: {}", path.display())))
}

#[async_trait]
impl SpeechRecognizer for WhisperCliBackend {
    fn id(&self) -> &'static str {
        "whisper-cli"
    }

    fn name(&self) -> &'static str {
        "Whisper (CLI)"
    }

    fn is_available(&self) -> bool {
        self.model_path.exists()
    }

    async fn transcribe(
        &self,
        audio: &AudioInput,
        language: &str,
    ) -> Result<Vec<RecognizedSegment>, BackendError> {
        if !self.is_available() {
            return Err(BackendError::Unavailable(format!(
                "Model not found: {}",
                self.model_path.display()
            )));
        }
        // whisper.cpp appends ".json" to the -of base name.
        let out_base = audio.path().with_extension("");
        let out_base_arg = path_arg(&out_base)?;
        let args = [
            "-m",
            path_arg(&self.model_path)?,
            "-f",
            path_arg(audio.path())?,
            "-l",
            language,
            "-ojf",
            "-of",
            out_base_arg,
            "-np",
        ];
        debug!("[transcribe] {} {}", self.binary_path, args.join(" "));
        let output = Command::new(&self.binary_path)
            .args(args)
            .output()
            .await
            .map_err(|e| BackendError::Process(format!("Failed to run whisper: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Process(format!("Whisper failed: {}", stderr.trim())));
        }

        let json = tokio::fs::read_to_string(format!("{}.json", out_base_arg)).await?;
        parse_whisper_json(&json)
    }
}
