//! Application settings, read once at startup from a JSON file.
//!
//! Every field has a default, so a missing file or a partial file is fine.

use crate::error::{Error, Result};
use crate::timeline::OverlapPolicy;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Overrides the platform data directory.
    pub data_dir: Option<PathBuf>,
    pub log_level: String,
    pub default_language: String,
    pub upload: UploadConfig,
    pub transcription: TranscriptionConfig,
    pub media: MediaConfig,
    pub burn_in: BurnInConfig,
    pub editor: EditorConfig,
    pub jobs: JobsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_level: "info".to_string(),
            default_language: "en".to_string(),
            upload: UploadConfig::default(),
            transcription: TranscriptionConfig::default(),
            media: MediaConfig::default(),
            burn_in: BurnInConfig::default(),
            editor: EditorConfig::default(),
            jobs: JobsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_size_bytes: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 500 * 1024 * 1024,
            allowed_extensions: ["mp4", "avi", "mov", "mkv", "webm"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    WhisperCli,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub backend: BackendKind,
    /// Whisper model name (tiny, base, small, medium, large-v3, ...).
    pub model: String,
    /// Explicit model file; wins over `model`.
    pub model_path: Option<PathBuf>,
    /// whisper.cpp executable; looked up on PATH when unset.
    pub whisper_binary: Option<String>,
    pub auto_download: bool,
    pub remote: RemoteConfig,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            model: "base".to_string(),
            model_path: None,
            whisper_binary: None,
            auto_download: true,
            remote: RemoteConfig::default(),
        }
    }
}

/// OpenAI-compatible transcription endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Full endpoint, e.g. http://localhost:8000/v1/audio/transcriptions
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            model: "whisper-1".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub video_codec: String,
    pub preset: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BurnInConfig {
    pub style: String,
    pub font_size: u32,
    pub font_color: String,
    pub outline_color: String,
}

impl Default for BurnInConfig {
    fn default() -> Self {
        Self {
            style: "default".to_string(),
            font_size: 24,
            font_color: "white".to_string(),
            outline_color: "black".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub overlap_policy: OverlapPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub queue_capacity: usize,
    /// Attempts at persisting a job failure before giving up.
    pub status_write_retries: u32,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            status_write_retries: 3,
        }
    }
}

impl AppConfig {
    /// Load settings from `path`, or from the default location when `None`.
    /// A missing file yields defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(crate::paths::default_config_path);
        if !path.exists() {
            debug!("[config] {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(&path)?;
        let config: AppConfig = serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        info!("[config] loaded {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.jobs.queue_capacity == 0 {
            return Err(Error::Config("jobs.queue_capacity must be at least 1".into()));
        }
        if self.default_language.trim().is_empty() {
            return Err(Error::Config("default_language cannot be empty".into()));
        }
        if self.upload.allowed_extensions.is_empty() {
            return Err(Error::Config("upload.allowed_extensions cannot be empty".into()));
        }
        Ok(())
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level
            .parse()
            .unwrap_or(log::LevelFilter::Info)
    }
}
