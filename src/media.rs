//! Media decode/encode collaborator: probing, audio extraction and burn-in,
//! backed by the ffprobe / ffmpeg command-line tools.

use crate::config::{MediaConfig, UploadConfig};
use crate::error::{Error, Result};
use crate::project::VideoDescriptor;
use crate::store::ProjectStore;
use log::{debug, info, warn};
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use uuid::Uuid;

/// What the probe learned about a video file.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub duration: f64,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub has_video: bool,
    pub has_audio: bool,
    pub format_name: String,
}

pub trait MediaToolkit: Send + Sync {
    fn probe(&self, video: &Path) -> Result<VideoInfo>;

    /// Decode the audio track to 16 kHz mono 16-bit PCM WAV.
    fn extract_audio(&self, video: &Path, wav_out: &Path) -> Result<()>;

    /// Re-encode `video` into `output` with `filter` applied to the frames.
    /// Audio is copied.
    fn burn_in(&self, video: &Path, filter: &str, output: &Path) -> Result<()>;
}

pub struct FfmpegToolkit {
    config: MediaConfig,
}

impl FfmpegToolkit {
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    fn run(&self, binary: &str, args: &[&str]) -> Result<Vec<u8>> {
        debug!("[media] {} {}", binary, args.join(" "));
        let output = Command::new(binary)
            .args(args)
            .output()
            .map_err(|e| Error::Media(format!("Failed to run {}: {}", binary, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Media(format!("{} failed: {}", binary, stderr.trim())));
        }
        Ok(output.stdout)
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: ProbeFormat,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// ffprobe reports numbers as strings in the format section.
#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    size: Option<String>,
    #[serde(default)]
    format_name: String,
}

fn parse_probe(json: &[u8]) -> Result<VideoInfo> {
    let probe: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| Error::Media(format!("Unreadable probe output: {}", e)))?;
    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));
    let number = |raw: Option<&String>, what: &str| -> Result<f64> {
        raw.and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| Error::Media(format!("probe did not report {}", what)))
    };
    Ok(VideoInfo {
        duration: number(probe.format.duration.as_ref(), "a duration")?,
        size: number(probe.format.size.as_ref(), "a size")? as u64,
        width: video.and_then(|v| v.width).unwrap_or(0),
        height: video.and_then(|v| v.height).unwrap_or(0),
        has_video: video.is_some(),
        has_audio,
        format_name: probe.format.format_name,
    })
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| Error::InvalidInput(format!("path is not valid UTF-8: {}", path.display())))
}

impl MediaToolkit for FfmpegToolkit {
    fn probe(&self, video: &Path) -> Result<VideoInfo> {
        let stdout = self.run(
            &self.config.ffprobe,
            &[
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                path_arg(video)?,
            ],
        )?;
        parse_probe(&stdout)
    }

    fn extract_audio(&self, video: &Path, wav_out: &Path) -> Result<()> {
        self.run(
            &self.config.ffmpeg,
            &[
                "-y",
                "-v",
                "error",
                "-i",
                path_arg(video)?,
                "-vn",
                "-acodec",
                "pcm_s16le",
                "-ac",
                "1",
                "-ar",
                "16000",
                path_arg(wav_out)?,
            ],
        )?;
        Ok(())
    }

    fn burn_in(&self, video: &Path, filter: &str, output: &Path) -> Result<()> {
        self.run(
            &self.config.ffmpeg,
            &[
                "-y",
                "-v",
                "error",
                "-i",
                path_arg(video)?,
                "-vf",
                filter,
                "-c:a",
                "copy",
                "-c:v",
                self.config.video_codec.as_str(),
                "-preset",
                self.config.preset.as_str(),
                path_arg(output)?,
            ],
        )?;
        Ok(())
    }
}

/// Lower-cased extension of `path` if it is one of the allowed ones.
pub fn check_extension(path: &Path, upload: &UploadConfig) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if upload.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext)) {
        Ok(ext)
    } else {
        Err(Error::validation(
            "video",
            format!(
                "Unsupported file format. Allowed formats: {}",
                upload.allowed_extensions.join(", ")
            ),
        ))
    }
}

pub fn check_size(size: u64, upload: &UploadConfig) -> Result<()> {
    if size > upload.max_size_bytes {
        return Err(Error::validation(
            "video",
            format!(
                "File size too large. Maximum size is {}MB",
                upload.max_size_bytes / (1024 * 1024)
            ),
        ));
    }
    Ok(())
}

/// Validate `source`, copy it into the videos directory and attach it to the
/// project.
pub fn ingest_video(
    store: &ProjectStore,
    media: &dyn MediaToolkit,
    upload: &UploadConfig,
    project_id: Uuid,
    source: &Path,
) -> Result<VideoDescriptor> {
    let ext = check_extension(source, upload)?;
    check_size(std::fs::metadata(source)?.len(), upload)?;
    let info = media.probe(source)?;
    if !info.has_video {
        return Err(Error::validation("video", "Invalid video file: No video stream found"));
    }

    store.read(project_id, |project| project.ensure_accepts_video())?;

    let videos_dir = store.paths().videos_dir()?;
    let mut staged = tempfile::Builder::new()
        .prefix(".ingest-")
        .tempfile_in(&videos_dir)?;
    std::io::copy(&mut std::fs::File::open(source)?, staged.as_file_mut())?;

    let descriptor = VideoDescriptor {
        path: videos_dir.join(format!("{}.{}", project_id, ext)),
        original_name: source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        duration: info.duration,
        size: info.size,
    };
    attach_staged(store, project_id, staged, &descriptor)?;
    info!(
        "[media] project {}: stored {} ({:.1}s, {}x{}, audio: {})",
        project_id,
        descriptor.path.display(),
        info.duration,
        info.width,
        info.height,
        info.has_audio
    );
    Ok(descriptor)
}

/// Attach `descriptor` and move the staged copy to its path in one update, so
/// only the ingest that wins the attach ever touches the final file. A losing
/// ingest's staged copy is removed when dropped.
fn attach_staged(
    store: &ProjectStore,
    project_id: Uuid,
    staged: tempfile::NamedTempFile,
    descriptor: &VideoDescriptor,
) -> Result<()> {
    let mut staged = Some(staged);
    let mut moved = false;
    let attached = store.update(project_id, |project| {
        project.attach_video(descriptor.clone())?;
        if let Some(file) = staged.take() {
            file.persist(&descriptor.path).map_err(|e| e.error)?;
            moved = true;
        }
        Ok(())
    });
    if let Err(e) = attached {
        if moved {
            if let Err(rm) = std::fs::remove_file(&descriptor.path) {
                warn!("[media] could not remove {}: {}", descriptor.path.display(), rm);
            }
        }
        return Err(e);
    }
    Ok(())
}
