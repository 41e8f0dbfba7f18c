//! Project persistence with per-project serialization.
//!
//! Each project lives in one JSON file, which is the source of truth: every
//! read and update starts from what is on disk, so separate processes sharing
//! a data directory see each other's changes. In memory a project has a slot:
//! a mutex that serializes changes within this process, and a read/write lease
//! on its stored video. Across processes an update holds an advisory lock on
//! `projects/{id}.lock` from reload to save. Mutations run on a copy, the copy
//! is persisted, and only then is it cached, so a failed write leaves the file
//! untouched.

use crate::error::{Error, Result};
use crate::paths::Paths;
use crate::project::{list_projects_in, load_project, save_project, ProjectMeta, SubtitleProject};
use crate::timeline::OverlapPolicy;
use fs2::FileExt;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use uuid::Uuid;

struct ProjectSlot {
    /// Last state read from or written to disk. `None` until first loaded and
    /// once the project has been deleted.
    project: Mutex<Option<SubtitleProject>>,
    video: Arc<RwLock<()>>,
}

impl ProjectSlot {
    fn new(project: Option<SubtitleProject>) -> Self {
        Self {
            project: Mutex::new(project),
            video: Arc::new(RwLock::new(())),
        }
    }
}

/// Exclusive advisory lock on a project, released on drop.
struct FileLock {
    file: File,
    path: PathBuf,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            debug!("[store] unlock {}: {}", self.path.display(), e);
        }
    }
}

/// Shared access to a project's stored video. The file is not removed while
/// any lease is alive.
pub struct VideoLease {
    _guard: OwnedRwLockReadGuard<()>,
    path: PathBuf,
}

impl VideoLease {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct ProjectStore {
    paths: Paths,
    policy: OverlapPolicy,
    slots: Mutex<HashMap<Uuid, Arc<ProjectSlot>>>,
}

impl ProjectStore {
    pub fn open(paths: Paths, policy: OverlapPolicy) -> Result<Self> {
        paths.ensure_directories()?;
        Ok(Self {
            paths,
            policy,
            slots: Mutex::new(HashMap::new()),
        })
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn create(&self, name: &str, description: &str, language: &str) -> Result<SubtitleProject> {
        let project = SubtitleProject::new(name, description, language, self.policy)?;
        save_project(&self.paths.project_file(project.id)?, &project)?;
        let mut slots = self.slots.lock().map_err(|_| Error::LockPoisoned)?;
        slots.insert(project.id, Arc::new(ProjectSlot::new(Some(project.clone()))));
        info!("[store] created project {} ({})", project.id, project.name);
        Ok(project)
    }

    pub fn list(&self) -> Result<Vec<ProjectMeta>> {
        list_projects_in(&self.paths.projects_dir()?)
    }

    /// Current state of a project (a copy).
    pub fn get(&self, id: Uuid) -> Result<SubtitleProject> {
        self.read(id, |project| Ok(project.clone()))
    }

    /// Run `f` on the project as currently stored. Saves are atomic renames,
    /// so no file lock is needed to read a whole version.
    pub fn read<T>(&self, id: Uuid, f: impl FnOnce(&SubtitleProject) -> Result<T>) -> Result<T> {
        let slot = self.slot(id)?;
        let mut guard = slot.project.lock().map_err(|_| Error::LockPoisoned)?;
        f(self.reload(id, &mut guard)?)
    }

    /// Apply `f` to a copy of the stored project, persist it, then commit.
    /// Holds the project's file lock from reload to save, so an update made
    /// by another process in between is never overwritten.
    pub fn update<T>(&self, id: Uuid, f: impl FnOnce(&mut SubtitleProject) -> Result<T>) -> Result<T> {
        let slot = self.slot(id)?;
        let mut guard = slot.project.lock().map_err(|_| Error::LockPoisoned)?;
        let _lock = self.lock_file(id)?;
        let mut draft = self.reload(id, &mut guard)?.clone();
        let out = f(&mut draft)?;
        draft.touch();
        save_project(&self.paths.project_file(id)?, &draft)?;
        *guard = Some(draft);
        Ok(out)
    }

    /// Wait for shared access to the project's video.
    pub async fn video_lease(&self, id: Uuid) -> Result<VideoLease> {
        let slot = self.slot(id)?;
        let guard = slot.video.clone().read_owned().await;
        let path = self.read(id, |project| {
            project
                .video()
                .map(|v| v.path.clone())
                .ok_or_else(|| Error::InvalidState("project has no video".into()))
        })?;
        Ok(VideoLease {
            _guard: guard,
            path,
        })
    }

    /// Record a job failure, retrying the write. When it still cannot be
    /// persisted the result carries both the job error and the write error.
    pub async fn mark_failed(&self, id: Uuid, job_error: &Error, attempts: u32) -> Result<()> {
        let reason = job_error.to_string();
        let attempts = attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.update(id, |project| project.fail(reason.clone())) {
                Ok(()) => {
                    info!("[store] project {} marked failed: {}", id, reason);
                    return Ok(());
                }
                Err(e @ Error::Io(_)) if attempt < attempts => {
                    warn!("[store] failure write for {} failed (attempt {}): {}", id, attempt, e);
                    last_error = Some(e);
                    tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
                }
                Err(e) => {
                    last_error = Some(e);
                    break;
                }
            }
        }
        let write_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        Err(Error::StatusWriteFailed {
            project: id.to_string(),
            job_error: reason,
            write_error,
        })
    }

    /// Delete the project file, every export file and, unless `keep_video`,
    /// the stored video. Waits until no operation holds the video.
    pub async fn delete(&self, id: Uuid, keep_video: bool) -> Result<()> {
        let slot = self.slot(id)?;
        let _exclusive = slot.video.clone().write_owned().await;
        let project_file = self.paths.project_file(id)?;
        let lock_path = self.lock_path(id)?;
        let project = {
            let mut guard = slot.project.lock().map_err(|_| Error::LockPoisoned)?;
            let _lock = self.lock_file(id)?;
            self.reload(id, &mut guard)?;
            let project = guard
                .take()
                .ok_or_else(|| Error::ProjectNotFound(id.to_string()))?;
            if let Err(e) = std::fs::remove_file(&project_file) {
                *guard = Some(project);
                return Err(e.into());
            }
            project
        };
        if let Ok(mut slots) = self.slots.lock() {
            slots.remove(&id);
        }
        remove_if_exists(&lock_path);

        for export in project.exports() {
            remove_if_exists(&export.path);
        }
        if !keep_video {
            if let Some(video) = project.video() {
                remove_if_exists(&video.path);
            }
        }
        info!("[store] deleted project {} ({} exports)", id, project.exports().len());
        Ok(())
    }

    fn slot(&self, id: Uuid) -> Result<Arc<ProjectSlot>> {
        let mut slots = self.slots.lock().map_err(|_| Error::LockPoisoned)?;
        if let Some(slot) = slots.get(&id) {
            return Ok(slot.clone());
        }
        if !self.paths.project_file(id)?.exists() {
            return Err(Error::ProjectNotFound(id.to_string()));
        }
        let slot = Arc::new(ProjectSlot::new(None));
        slots.insert(id, slot.clone());
        Ok(slot)
    }

    /// Refresh the cached state from the project file. A missing file means
    /// the project was deleted, possibly by another process.
    fn reload<'a>(
        &self,
        id: Uuid,
        cached: &'a mut Option<SubtitleProject>,
    ) -> Result<&'a SubtitleProject> {
        let path = self.paths.project_file(id)?;
        if !path.exists() {
            *cached = None;
            return Err(Error::ProjectNotFound(id.to_string()));
        }
        let project = load_project(&path, self.policy)?;
        debug!("[store] loaded project {} from {}", id, path.display());
        Ok(cached.insert(project))
    }

    fn lock_path(&self, id: Uuid) -> Result<PathBuf> {
        Ok(self.paths.projects_dir()?.join(format!("{}.lock", id)))
    }

    fn lock_file(&self, id: Uuid) -> Result<FileLock> {
        let path = self.lock_path(id)?;
        let file = OpenOptions::new().create(true).write(true).open(&path)?;
        file.lock_exclusive()?;
        Ok(FileLock { file, path })
    }
}

fn remove_if_exists(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("[store] could not remove {}: {}", path.display(), e),
    }
}

/// Parse a project id given on the command line.
pub fn parse_project_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| Error::InvalidInput(format!("not a project id: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ProjectStatus;
    use crate::project::VideoDescriptor;
    use crate::timeline::{EntryId, NewEntry};

    fn store(dir: &Path) -> ProjectStore {
        ProjectStore::open(Paths::new(dir), OverlapPolicy::Tolerate).unwrap()
    }

    fn with_video(store: &ProjectStore, dir: &Path) -> Uuid {
        let project = store.create("Talk", "", "en").unwrap();
        let video_path = dir.join("videos").join("talk.mp4");
        std::fs::write(&video_path, b"video").unwrap();
        store
            .update(project.id, |p| {
                p.attach_video(VideoDescriptor {
                    path: video_path.clone(),
                    original_name: "talk.mp4".into(),
                    duration: 3.0,
                    size: 5,
                })
            })
            .unwrap();
        project.id
    }

    #[test]
    fn failed_mutation_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let id = store.create("Talk", "", "en").unwrap().id;
        let err = store.update(id, |p| p.dispatch()).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(store.get(id).unwrap().status(), ProjectStatus::Uploading);
    }

    #[test]
    fn reopened_store_reads_persisted_state() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = store(dir.path());
            let id = with_video(&store, dir.path());
            store.update(id, |p| p.dispatch()).unwrap();
            store
                .update(id, |p| {
                    p.complete_transcription(vec![NewEntry {
                        start_time: 0.0,
                        end_time: 1.0,
                        text: "hi".into(),
                        language: "en".into(),
                        confidence: None,
                    }])
                })
                .unwrap();
            id
        };
        let store = store(dir.path());
        let project = store.get(id).unwrap();
        assert!(project.is_completed());
        assert_eq!(project.subtitle_count(), 1);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn unknown_project_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let err = store.get(Uuid::new_v4()).unwrap_err();
        assert!(err.is_not_found());
        assert!(parse_project_id("nope").is_err());
    }

    #[tokio::test]
    async fn delete_removes_exports_and_video() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let id = with_video(&store, dir.path());
        let export_path = dir.path().join("exports").join("x.srt");
        std::fs::write(&export_path, "1").unwrap();
        store
            .update(id, |p| {
                let export_id = p.reserve_export_id();
                p.record_export(export_id, crate::export::ExportFormat::Srt, export_path.clone(), None);
                Ok(())
            })
            .unwrap();

        store.delete(id, false).await.unwrap();
        assert!(!export_path.exists());
        assert!(!dir.path().join("videos").join("talk.mp4").exists());
        assert!(store.get(id).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn delete_waits_for_video_lease() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store(dir.path()));
        let id = with_video(&store, dir.path());
        let lease = store.video_lease(id).await.unwrap();

        let deleter = {
            let store = store.clone();
            tokio::spawn(async move { store.delete(id, false).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(lease.path().exists());
        assert!(!deleter.is_finished());

        drop(lease);
        deleter.await.unwrap().unwrap();
        assert!(!dir.path().join("videos").join("talk.mp4").exists());
    }

    #[tokio::test]
    async fn keep_video_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let id = with_video(&store, dir.path());
        store.delete(id, true).await.unwrap();
        assert!(dir.path().join("videos").join("talk.mp4").exists());
    }

    #[tokio::test]
    async fn mark_failed_reports_unwritable_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let id = with_video(&store, dir.path());
        store.update(id, |p| p.dispatch()).unwrap();

        let projects = dir.path().join("projects");
        let file_name = format!("{}.json", id);
        let saved = std::fs::read(projects.join(&file_name)).unwrap();
        std::fs::remove_dir_all(&projects).unwrap();
        std::fs::write(&projects, "not a directory").unwrap();

        let job_error = Error::TranscriptionFailed("boom".into());
        let err = store.mark_failed(id, &job_error, 2).await.unwrap_err();
        match err {
            Error::StatusWriteFailed { job_error, .. } => {
                assert_eq!(job_error, "Transcription failed: boom")
            }
            other => panic!("unexpected error {other:?}"),
        }

        std::fs::remove_file(&projects).unwrap();
        std::fs::create_dir(&projects).unwrap();
        std::fs::write(projects.join(&file_name), saved).unwrap();
        assert_eq!(store.get(id).unwrap().status(), ProjectStatus::Processing);
    }

    fn completed(store: &ProjectStore, dir: &Path) -> Uuid {
        let id = with_video(store, dir);
        store.update(id, |p| p.dispatch()).unwrap();
        store
            .update(id, |p| {
                p.complete_transcription(vec![NewEntry {
                    start_time: 0.0,
                    end_time: 4.0,
                    text: "hello world".into(),
                    language: "en".into(),
                    confidence: None,
                }])
            })
            .unwrap();
        id
    }

    #[test]
    fn update_starts_from_changes_made_by_another_store() {
        let dir = tempfile::tempdir().unwrap();
        let a = store(dir.path());
        let id = completed(&a, dir.path());
        assert_eq!(a.get(id).unwrap().subtitle_count(), 1);

        let b = store(dir.path());
        b.update(id, |p| p.edit_timeline()?.split(EntryId(0), 2.0)).unwrap();

        assert_eq!(a.get(id).unwrap().subtitle_count(), 2);
        let export = crate::export::export_project(&a, id, crate::export::TextFormat::Srt).unwrap();
        assert_eq!(std::fs::read_to_string(&export.path).unwrap().matches(" --> ").count(), 2);

        let reopened = store(dir.path()).get(id).unwrap();
        assert_eq!(reopened.subtitle_count(), 2);
        assert_eq!(reopened.exports().len(), 1);
    }

    #[tokio::test]
    async fn project_deleted_elsewhere_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let a = store(dir.path());
        let id = with_video(&a, dir.path());
        a.get(id).unwrap();

        store(dir.path()).delete(id, true).await.unwrap();
        assert!(a.get(id).unwrap_err().is_not_found());
        assert!(a.update(id, |p| p.dispatch()).unwrap_err().is_not_found());
        assert!(!dir.path().join("projects").join(format!("{}.json", id)).exists());
        assert!(!dir.path().join("projects").join(format!("{}.lock", id)).exists());
    }

    #[tokio::test]
    async fn mark_failed_persists_reason() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let id = with_video(&store, dir.path());
        store.update(id, |p| p.dispatch()).unwrap();
        store
            .mark_failed(id, &Error::TranscriptionFailed("boom".into()), 3)
            .await
            .unwrap();
        let project = store.get(id).unwrap();
        assert_eq!(project.status(), ProjectStatus::Failed);
        assert_eq!(project.failure_reason(), Some("Transcription failed: boom"));
    }
}
