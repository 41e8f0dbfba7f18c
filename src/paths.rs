//! Path utilities for the data, projects, videos, exports and models directories.

use crate::error::Result;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const APP_DIR_NAME: &str = "subtitle-studio";

/// Root of everything the application stores on disk.
#[derive(Debug, Clone)]
pub struct Paths {
    data_dir: PathBuf,
}

impl Paths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// `data_dir` from the configuration, else the platform data dir
    /// (e.g. ~/.local/share/subtitle-studio on Linux).
    pub fn resolve(configured: Option<&Path>) -> Self {
        match configured {
            Some(dir) => Self::new(dir),
            None => Self::new(default_data_dir()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Project JSON files, creating the directory if necessary.
    pub fn projects_dir(&self) -> Result<PathBuf> {
        self.ensure("projects")
    }

    /// Uploaded videos, one file per project.
    pub fn videos_dir(&self) -> Result<PathBuf> {
        self.ensure("videos")
    }

    pub fn exports_dir(&self) -> Result<PathBuf> {
        self.ensure("exports")
    }

    pub fn models_dir(&self) -> Result<PathBuf> {
        self.ensure("models")
    }

    /// Scratch space for extracted audio and transient subtitle files.
    pub fn temp_dir(&self) -> Result<PathBuf> {
        self.ensure("tmp")
    }

    pub fn log_file_path(&self) -> Result<PathBuf> {
        Ok(self.ensure("logs")?.join(format!("{}.log", APP_DIR_NAME)))
    }

    pub fn project_file(&self, id: Uuid) -> Result<PathBuf> {
        Ok(self.projects_dir()?.join(format!("{}.json", id)))
    }

    /// Ensure all app directories exist.
    pub fn ensure_directories(&self) -> Result<()> {
        self.projects_dir()?;
        self.videos_dir()?;
        self.exports_dir()?;
        self.models_dir()?;
        self.temp_dir()?;
        self.log_file_path()?;
        Ok(())
    }

    fn ensure(&self, name: &str) -> Result<PathBuf> {
        let dir = self.data_dir.join(name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR_NAME))
}

/// Default settings file (e.g. ~/.config/subtitle-studio/settings.json).
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("settings.json")
}

/// Replace characters that are not allowed in file names on common platforms.
pub fn sanitize_file_stem(name: &str) -> String {
    let safe: String = name
        .trim()
        .chars()
        .map(|c| {
            if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    if safe.is_empty() {
        "project".to_string()
    } else {
        safe
    }
}
