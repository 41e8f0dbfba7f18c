//! Pluggable speech recognizers and the adapter that turns a video into
//! timeline entries.

mod adapter;
mod audio;
mod backend;
mod model_download;
#[cfg(feature = "transcription-openai")]
mod remote_api;
#[cfg(feature = "transcription-whisper-cli")]
mod whisper_cli;

#[cfg(test)]
pub(crate) use adapter::testing;
pub use adapter::{segments_to_entries, TranscriptionAdapter};
pub use audio::{write_pcm_wav, AudioInput, SAMPLE_RATE};
pub use backend::{BackendError, RecognizedSegment, SpeechRecognizer};
pub use model_download::{
    download_model_with_progress, ensure_model, list_installed_model_names, resolve_model_path,
    MODEL_SOURCES,
};
#[cfg(feature = "transcription-openai")]
pub use remote_api::{RemoteApiBackend, RemoteTranscriptionConfig};
#[cfg(feature = "transcription-whisper-cli")]
pub use whisper_cli::WhisperCliBackend;

use crate::config::{BackendKind, TranscriptionConfig};
use crate::error::{Error, Result};
use crate::paths::Paths;
use log::info;
use std::sync::Arc;

/// Build the recognizer selected in the configuration. For whisper.cpp the
/// model is resolved (and downloaded when allowed) up front.
pub async fn build_recognizer(
    config: &TranscriptionConfig,
    paths: &Paths,
) -> Result<Arc<dyn SpeechRecognizer>> {
    let recognizer: Arc<dyn SpeechRecognizer> = match config.backend {
        #[cfg(feature = "transcription-whisper-cli")]
        BackendKind::WhisperCli => {
            let model_path = match &config.model_path {
                Some(path) => path.clone(),
                None => ensure_model(&paths.models_dir()?, &config.model, config.auto_download).await?,
            };
            Arc::new(WhisperCliBackend::new(model_path, config.whisper_binary.clone()))
        }
        #[cfg(feature = "transcription-openai")]
        BackendKind::Remote => Arc::new(RemoteApiBackend::new((&config.remote).into())),
        #[allow(unreachable_patterns)]
        other => {
            return Err(Error::Config(format!(
                "transcription backend {:?} is not compiled into this build",
                other
            )))
        }
    };
    if !recognizer.is_available() {
        return Err(Error::Config(format!("{} is not available", recognizer.name())));
    }
    info!("[transcribe] using {}", recognizer.name());
    Ok(recognizer)
}
