//! Subtitle project record, its export history and JSON project files.

use crate::embed::SubtitleStyle;
use crate::error::{Error, Result};
use crate::export::ExportFormat;
use crate::lifecycle::{LifecycleEvent, ProjectStatus, TimelineAccess};
use crate::timeline::{validate_language, NewEntry, OverlapPolicy, Snapshot, Timeline};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const MAX_NAME_LEN: usize = 255;

/// The stored source video. Attached once, never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub path: PathBuf,
    /// File name as uploaded, used to name burned-in copies.
    pub original_name: String,
    /// Seconds.
    pub duration: f64,
    pub size: u64,
}

/// One produced artifact. Records are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleExport {
    pub id: u64,
    pub format: ExportFormat,
    pub path: PathBuf,
    #[serde(default)]
    pub style: Option<SubtitleStyle>,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleProject {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub language: String,
    status: ProjectStatus,
    #[serde(default)]
    failure_reason: Option<String>,
    #[serde(default)]
    video: Option<VideoDescriptor>,
    #[serde(default)]
    timeline: Timeline,
    #[serde(default)]
    exports: Vec<SubtitleExport>,
    /// Highest export id handed out, recorded or not.
    #[serde(default)]
    last_export_id: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl SubtitleProject {
    pub fn new(name: &str, description: &str, language: &str, policy: OverlapPolicy) -> Result<Self> {
        let now = now_secs();
        Ok(Self {
            id: Uuid::new_v4(),
            name: validate_name(name)?,
            description: description.trim().to_string(),
            language: validate_language(language)?,
            status: ProjectStatus::Uploading,
            failure_reason: None,
            video: None,
            timeline: Timeline::with_policy(policy),
            exports: Vec::new(),
            last_export_id: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn status(&self) -> ProjectStatus {
        self.status
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn video(&self) -> Option<&VideoDescriptor> {
        self.video.as_ref()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn exports(&self) -> &[SubtitleExport] {
        &self.exports
    }

    pub fn subtitle_count(&self) -> usize {
        self.timeline.subtitle_count()
    }

    pub fn is_processing(&self) -> bool {
        self.status.is_processing()
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    pub fn attach_video(&mut self, video: VideoDescriptor) -> Result<()> {
        self.ensure_accepts_video()?;
        self.video = Some(video);
        Ok(())
    }

    pub fn ensure_accepts_video(&self) -> Result<()> {
        if self.status != ProjectStatus::Uploading {
            return Err(Error::InvalidState(format!(
                "a video can only be attached while uploading, project is {}",
                self.status
            )));
        }
        if self.video.is_some() {
            return Err(Error::InvalidState("project already has a video".into()));
        }
        Ok(())
    }

    /// Hand the project to the transcription worker.
    pub fn dispatch(&mut self) -> Result<()> {
        if self.video.is_none() {
            return Err(Error::InvalidState("project has no video to transcribe".into()));
        }
        self.transition(LifecycleEvent::JobDispatched)
    }

    /// Load recognizer output and mark the project completed.
    pub fn complete_transcription(&mut self, entries: Vec<NewEntry>) -> Result<usize> {
        self.status.require(TimelineAccess::Load)?;
        let loaded = self.timeline.load(entries)?;
        self.transition(LifecycleEvent::TranscriptionSucceeded)?;
        Ok(loaded)
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition(LifecycleEvent::Failure)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    /// Mutable timeline access for manual edits.
    pub fn edit_timeline(&mut self) -> Result<&mut Timeline> {
        self.status.require(TimelineAccess::Edit)?;
        Ok(&mut self.timeline)
    }

    pub fn export_snapshot(&self) -> Result<Snapshot> {
        self.status.require(TimelineAccess::Export)?;
        Ok(self.timeline.snapshot())
    }

    pub fn next_export_id(&self) -> u64 {
        let recorded = self.exports.iter().map(|e| e.id).max().unwrap_or(0);
        recorded.max(self.last_export_id) + 1
    }

    /// Hand out an export id that no other export of this project will get,
    /// even if this one is never recorded. Output files are named after it.
    pub fn reserve_export_id(&mut self) -> u64 {
        let id = self.next_export_id();
        self.last_export_id = id;
        id
    }

    pub fn record_export(
        &mut self,
        id: u64,
        format: ExportFormat,
        path: PathBuf,
        style: Option<SubtitleStyle>,
    ) -> SubtitleExport {
        let export = SubtitleExport {
            id,
            format,
            path,
            style,
            created_at: now_secs(),
        };
        self.last_export_id = self.last_export_id.max(id);
        self.exports.push(export.clone());
        export
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = now_secs();
    }

    /// Re-establish invariants that serde cannot carry.
    pub(crate) fn restore(&mut self, policy: OverlapPolicy) {
        self.timeline.normalize();
        self.timeline.set_policy(policy);
    }

    fn transition(&mut self, event: LifecycleEvent) -> Result<()> {
        self.status = self.status.apply(event)?;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("name", "Project name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::validation(
            "name",
            format!("Project name cannot exceed {} characters", MAX_NAME_LEN),
        ));
    }
    Ok(name.to_string())
}

pub(crate) fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Write the project file atomically (temp file in the same directory, then rename).
pub fn save_project(path: &Path, project: &SubtitleProject) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, project)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub fn load_project(path: &Path, policy: OverlapPolicy) -> Result<SubtitleProject> {
    let json = std::fs::read_to_string(path)?;
    let mut project: SubtitleProject = serde_json::from_str(&json)?;
    project.restore(policy);
    Ok(project)
}

/// Metadata for display in the project list.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectMeta {
    pub id: Uuid,
    pub name: String,
    pub status: ProjectStatus,
    pub subtitle_count: usize,
    pub created_at: u64,
}

/// Minimal struct for reading metadata without validating the whole file.
#[derive(Deserialize)]
struct ProjectMetaPartial {
    id: Uuid,
    name: String,
    status: ProjectStatus,
    #[serde(default)]
    timeline: TimelineCount,
    created_at: Option<u64>,
}

#[derive(Deserialize, Default)]
struct TimelineCount {
    #[serde(default)]
    entries: Vec<serde::de::IgnoredAny>,
}

/// Scan `dir` for project files, newest first. Unreadable files are skipped.
pub fn list_projects_in(dir: &Path) -> Result<Vec<ProjectMeta>> {
    let mut projects = Vec::new();
    if !dir.exists() {
        return Ok(projects);
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().map_or(true, |e| e != "json") {
            continue;
        }
        let meta = std::fs::read_to_string(&path)
            .map_err(Error::from)
            .and_then(|json| serde_json::from_str::<ProjectMetaPartial>(&json).map_err(Error::from));
        match meta {
            Ok(meta) => projects.push(ProjectMeta {
                id: meta.id,
                name: meta.name,
                status: meta.status,
                subtitle_count: meta.timeline.entries.len(),
                created_at: meta.created_at.unwrap_or(0),
            }),
            Err(e) => warn!("[store] skipping {}: {}", path.display(), e),
        }
    }
    projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(projects)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video() -> VideoDescriptor {
        VideoDescriptor {
            path: PathBuf::from("/videos/talk.mp4"),
            original_name: "talk.mp4".into(),
            duration: 12.5,
            size: 1024,
        }
    }

    fn entry(start: f64, end: f64, text: &str) -> NewEntry {
        NewEntry {
            start_time: start,
            end_time: end,
            text: text.into(),
            language: "en".into(),
            confidence: Some(-0.3),
        }
    }

    fn processing() -> SubtitleProject {
        let mut project = SubtitleProject::new("Talk", "", "en", OverlapPolicy::Tolerate).unwrap();
        project.attach_video(video()).unwrap();
        project.dispatch().unwrap();
        project
    }

    #[test]
    fn name_is_trimmed_and_required() {
        let project = SubtitleProject::new("  Talk ", " desc ", "en", OverlapPolicy::Tolerate).unwrap();
        assert_eq!(project.name, "Talk");
        assert_eq!(project.description, "desc");
        assert_eq!(project.status(), ProjectStatus::Uploading);
        let err = SubtitleProject::new("   ", "", "en", OverlapPolicy::Tolerate).unwrap_err();
        assert_eq!(err.to_string(), "name: Project name cannot be empty");
    }

    #[test]
    fn video_is_attached_once() {
        let mut project = SubtitleProject::new("Talk", "", "en", OverlapPolicy::Tolerate).unwrap();
        assert!(project.dispatch().is_err());
        project.attach_video(video()).unwrap();
        assert!(project.attach_video(video()).is_err());
    }

    #[test]
    fn transcription_completes_project() {
        let mut project = processing();
        assert!(project.edit_timeline().is_err());
        assert!(project.export_snapshot().is_err());
        let loaded = project
            .complete_transcription(vec![entry(0.0, 2.0, "Hello"), entry(2.0, 5.0, "World")])
            .unwrap();
        assert_eq!(loaded, 2);
        assert!(project.is_completed());
        assert_eq!(project.subtitle_count(), 2);
        assert_eq!(project.export_snapshot().unwrap().len(), 2);
        assert!(project.complete_transcription(vec![]).is_err());
    }

    #[test]
    fn failure_keeps_timeline_empty() {
        let mut project = processing();
        project.fail("Transcription failed: boom").unwrap();
        assert_eq!(project.status(), ProjectStatus::Failed);
        assert_eq!(project.subtitle_count(), 0);
        assert_eq!(project.failure_reason(), Some("Transcription failed: boom"));
        assert!(project.fail("again").is_ok());
        assert!(project.edit_timeline().is_err());
    }

    #[test]
    fn export_ids_are_sequential() {
        let mut project = processing();
        project.complete_transcription(vec![entry(0.0, 1.0, "a")]).unwrap();
        let id = project.reserve_export_id();
        let first = project.record_export(id, ExportFormat::Srt, "a.srt".into(), None);
        let id = project.reserve_export_id();
        let second = project.record_export(
            id,
            ExportFormat::EmbeddedVideo,
            "b.mp4".into(),
            Some(SubtitleStyle::Bold),
        );
        assert_eq!((first.id, second.id), (1, 2));
        assert_eq!(project.exports().len(), 2);
        assert_eq!(project.next_export_id(), 3);
    }

    #[test]
    fn reserved_export_ids_are_never_reused() {
        let mut project = processing();
        project.complete_transcription(vec![entry(0.0, 1.0, "a")]).unwrap();
        let abandoned = project.reserve_export_id();
        let pending = project.reserve_export_id();
        assert_ne!(abandoned, pending);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        save_project(&path, &project).unwrap();
        let mut reloaded = load_project(&path, OverlapPolicy::Tolerate).unwrap();
        assert_eq!(reloaded.reserve_export_id(), pending + 1);
        let recorded = reloaded.record_export(pending, ExportFormat::Vtt, "p.vtt".into(), None);
        assert_eq!(recorded.id, pending);
    }

    #[test]
    fn project_file_round_trips_and_lists() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = processing();
        project.complete_transcription(vec![entry(0.0, 1.0, "a")]).unwrap();
        let path = dir.path().join(format!("{}.json", project.id));
        save_project(&path, &project).unwrap();

        let mut loaded = load_project(&path, OverlapPolicy::Reject).unwrap();
        assert_eq!(loaded.id, project.id);
        assert_eq!(loaded.timeline().policy(), OverlapPolicy::Reject);
        let inserted = loaded
            .edit_timeline()
            .unwrap()
            .insert(entry(5.0, 6.0, "b"))
            .unwrap();
        assert_ne!(inserted.id, project.timeline().entries()[0].id);

        std::fs::write(dir.path().join("junk.json"), "{}").unwrap();
        let listed = list_projects_in(dir.path()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].subtitle_count, 1);
        assert_eq!(listed[0].status, ProjectStatus::Completed);
    }
}
