//! Export timeline snapshots to SRT, VTT and plain text.

mod srt;
mod txt;
mod vtt;

pub use srt::{decode_srt, encode_srt};
pub use txt::encode_txt;
pub use vtt::encode_vtt;

use crate::error::{Error, Result};
use crate::project::SubtitleExport;
use crate::store::ProjectStore;
use crate::timeline::SubtitleEntry;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// Sidecar text formats the encoders produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    Srt,
    Vtt,
    Txt,
}

impl TextFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TextFormat::Srt => "srt",
            TextFormat::Vtt => "vtt",
            TextFormat::Txt => "txt",
        }
    }
}

impl FromStr for TextFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "srt" => Ok(TextFormat::Srt),
            "vtt" => Ok(TextFormat::Vtt),
            "txt" => Ok(TextFormat::Txt),
            other => Err(Error::validation(
                "format",
                format!("Unsupported format: {}", other),
            )),
        }
    }
}

/// Format tag of an export record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Srt,
    Vtt,
    Txt,
    EmbeddedVideo,
}

impl From<TextFormat> for ExportFormat {
    fn from(format: TextFormat) -> Self {
        match format {
            TextFormat::Srt => ExportFormat::Srt,
            TextFormat::Vtt => ExportFormat::Vtt,
            TextFormat::Txt => ExportFormat::Txt,
        }
    }
}

/// Timing and text of one caption as stored in a subtitle file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

impl From<&SubtitleEntry> for Cue {
    fn from(entry: &SubtitleEntry) -> Self {
        Self {
            start_time: entry.start_time,
            end_time: entry.end_time,
            text: entry.text.clone(),
        }
    }
}

pub fn encode(format: TextFormat, entries: &[SubtitleEntry]) -> String {
    match format {
        TextFormat::Srt => encode_srt(entries),
        TextFormat::Vtt => encode_vtt(entries),
        TextFormat::Txt => encode_txt(entries),
    }
}

/// Encode `entries` and write them to `path` as UTF-8.
pub fn write_export(path: &Path, format: TextFormat, entries: &[SubtitleEntry]) -> Result<()> {
    std::fs::write(path, encode(format, entries))?;
    Ok(())
}

/// Render a completed project's timeline, write it to the exports directory
/// and append the export record. Every export gets its own file.
pub fn export_project(
    store: &ProjectStore,
    project_id: Uuid,
    format: TextFormat,
) -> Result<SubtitleExport> {
    let exports_dir = store.paths().exports_dir()?;
    let export = store.update(project_id, |project| {
        let snapshot = project.export_snapshot()?;
        let export_id = project.reserve_export_id();
        let path = exports_dir.join(format!(
            "{}_{}.{}",
            project.id,
            export_id,
            format.extension()
        ));
        write_export(&path, format, &snapshot)?;
        Ok(project.record_export(export_id, format.into(), path, None))
    })?;
    info!(
        "[export] project {} -> {} ({:?})",
        project_id,
        export.path.display(),
        format
    );
    Ok(export)
}
