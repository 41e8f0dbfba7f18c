//! Burn subtitles permanently into a project's video.

mod overlay;
mod style;

pub use overlay::OverlaySpec;
pub use style::{Backdrop, StyleParams, SubtitleStyle};

use crate::config::BurnInConfig;
use crate::error::{Error, Result};
use crate::export::{encode_srt, ExportFormat};
use crate::media::MediaToolkit;
use crate::paths::sanitize_file_stem;
use crate::project::SubtitleExport;
use crate::store::ProjectStore;
use crate::timeline::SubtitleEntry;
use log::{info, warn};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

const MAX_FONT_SIZE: u32 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnInOptions {
    pub font_size: u32,
    pub font_color: String,
    pub outline_color: String,
}

impl Default for BurnInOptions {
    fn default() -> Self {
        Self {
            font_size: 24,
            font_color: "white".to_string(),
            outline_color: "black".to_string(),
        }
    }
}

impl From<&BurnInConfig> for BurnInOptions {
    fn from(config: &BurnInConfig) -> Self {
        Self {
            font_size: config.font_size,
            font_color: config.font_color.clone(),
            outline_color: config.outline_color.clone(),
        }
    }
}

impl BurnInOptions {
    pub fn validate(&self) -> Result<()> {
        if self.font_size == 0 || self.font_size > MAX_FONT_SIZE {
            return Err(Error::validation(
                "font_size",
                format!("Font size must be between 1 and {}", MAX_FONT_SIZE),
            ));
        }
        overlay::parse_color(&self.font_color)
            .map_err(|_| Error::validation("font_color", format!("Unsupported color: {}", self.font_color)))?;
        overlay::parse_color(&self.outline_color).map_err(|_| {
            Error::validation("outline_color", format!("Unsupported color: {}", self.outline_color))
        })?;
        Ok(())
    }
}

/// Everything the renderer needs: the overlay and the captions to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct BurnInPlan {
    pub style: SubtitleStyle,
    pub overlay: OverlaySpec,
    pub srt_document: String,
}

pub fn overlay_for(style: SubtitleStyle, options: &BurnInOptions) -> OverlaySpec {
    let params = style.params();
    let font_size = (i64::from(options.font_size) + i64::from(params.font_size_delta)).max(1);

    let mut spec = OverlaySpec::default();
    spec.push("fontsize", font_size);
    spec.push("fontcolor", &options.font_color);
    if params.outline_width > 0 {
        spec.push("outline", params.outline_width);
        spec.push("outlinecolor", &options.outline_color);
    }
    if params.shadow_width > 0 {
        spec.push("shadow", params.shadow_width);
        if let Some(color) = params.shadow_color {
            spec.push("shadowcolor", color);
        }
        if let Some(offset) = params.shadow_offset {
            spec.push("shadowoffset", offset);
        }
    }
    if let Some(backdrop) = params.backdrop {
        spec.push("box", 1);
        spec.push("boxcolor", backdrop.color);
        spec.push("boxborderw", backdrop.border_width);
    }
    spec
}

/// Escape caption text for the overlay renderer, which treats `{...}` as
/// override tags and `\` as an escape.
pub fn escape_caption_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '{' | '}') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn plan_burn_in(
    entries: &[SubtitleEntry],
    style: SubtitleStyle,
    options: &BurnInOptions,
) -> Result<BurnInPlan> {
    options.validate()?;
    let escaped: Vec<SubtitleEntry> = entries
        .iter()
        .map(|entry| SubtitleEntry {
            text: escape_caption_text(&entry.text),
            ..entry.clone()
        })
        .collect();
    Ok(BurnInPlan {
        style,
        overlay: overlay_for(style, options),
        srt_document: encode_srt(&escaped),
    })
}

/// Render the completed project's subtitles into a copy of its video and
/// record an `embedded_video` export.
///
/// Holds a lease on the stored video for the whole encode, so the project
/// cannot be deleted underneath it.
pub async fn burn_in_project(
    store: &ProjectStore,
    media: Arc<dyn MediaToolkit>,
    project_id: Uuid,
    style: SubtitleStyle,
    options: &BurnInOptions,
) -> Result<SubtitleExport> {
    let lease = store.video_lease(project_id).await?;
    // The id is reserved up front so concurrent burn-ins never share an output file.
    let (snapshot, stem, export_id) = store.update(project_id, |project| {
        let snapshot = project.export_snapshot()?;
        let stem = project
            .video()
            .and_then(|v| Path::new(&v.original_name).file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| project.name.clone());
        Ok((snapshot, stem, project.reserve_export_id()))
    })?;
    let plan = plan_burn_in(&snapshot, style, options)?;

    let paths = store.paths();
    let mut srt = tempfile::Builder::new()
        .prefix("burn-in-")
        .suffix(".srt")
        .tempfile_in(paths.temp_dir()?)?;
    srt.write_all(plan.srt_document.as_bytes())?;
    srt.flush()?;
    let filter = plan.overlay.filter_for(srt.path())?;

    let output = paths.exports_dir()?.join(format!(
        "{}_with_subtitles_{}_{}.mp4",
        sanitize_file_stem(&stem),
        project_id.simple(),
        export_id
    ));
    info!("[embed] project {}: rendering {} style", project_id, style);

    let video = lease.path().to_path_buf();
    let out = output.clone();
    let rendered = tokio::task::spawn_blocking(move || media.burn_in(&video, &filter, &out))
        .await
        .map_err(|e| Error::Media(format!("burn-in task failed: {}", e)))
        .and_then(|r| r);
    drop(srt);
    drop(lease);
    if let Err(e) = rendered {
        if output.exists() {
            if let Err(rm) = std::fs::remove_file(&output) {
                warn!("[embed] could not remove partial {}: {}", output.display(), rm);
            }
        }
        return Err(e);
    }

    let export = store.update(project_id, |project| {
        Ok(project.record_export(
            export_id,
            ExportFormat::EmbeddedVideo,
            output.clone(),
            Some(style),
        ))
    })?;
    info!("[embed] project {} -> {}", project_id, export.path.display());
    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::testing::FakeMedia;
    use crate::paths::Paths;
    use crate::timeline::{EntryId, NewEntry, OverlapPolicy};

    fn entry(id: u64, start: f64, end: f64, text: &str) -> SubtitleEntry {
        SubtitleEntry {
            id: EntryId(id),
            start_time: start,
            end_time: end,
            text: text.to_string(),
            language: "en".to_string(),
            confidence: None,
            is_edited: false,
        }
    }

    fn keys(spec: &OverlaySpec) -> Vec<&'static str> {
        spec.params().iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn default_style_overlay() {
        let spec = overlay_for(SubtitleStyle::Default, &BurnInOptions::default());
        assert_eq!(
            spec.to_key_values(),
            "fontsize=24:fontcolor=white:outline=2:outlinecolor=black:shadow=1:shadowcolor=black:shadowoffset=2"
        );
    }

    #[test]
    fn modern_style_has_box_in_fixed_order() {
        let spec = overlay_for(SubtitleStyle::Modern, &BurnInOptions::default());
        assert_eq!(
            keys(&spec),
            [
                "fontsize",
                "fontcolor",
                "outline",
                "outlinecolor",
                "shadow",
                "shadowcolor",
                "shadowoffset",
                "box",
                "boxcolor",
                "boxborderw"
            ]
        );
        assert_eq!(spec.get("boxcolor"), Some("rgba(0,0,0,0.3)"));
        assert_eq!(spec.get("boxborderw"), Some("5"));
    }

    #[test]
    fn bold_and_minimal_adjust_font_size() {
        let options = BurnInOptions::default();
        assert_eq!(overlay_for(SubtitleStyle::Bold, &options).get("fontsize"), Some("28"));
        let minimal = overlay_for(SubtitleStyle::Minimal, &options);
        assert_eq!(minimal.get("fontsize"), Some("22"));
        assert_eq!(minimal.get("shadow"), None);
        assert_eq!(minimal.get("shadowcolor"), None);
        let tiny = BurnInOptions {
            font_size: 1,
            ..BurnInOptions::default()
        };
        assert_eq!(overlay_for(SubtitleStyle::Minimal, &tiny).get("fontsize"), Some("1"));
    }

    #[test]
    fn unknown_style_plans_like_default() {
        let options = BurnInOptions::default();
        assert_eq!(
            overlay_for(SubtitleStyle::from_name("sparkly"), &options),
            overlay_for(SubtitleStyle::Default, &options)
        );
    }

    #[test]
    fn plan_escapes_caption_text() {
        let entries = [entry(0, 0.0, 1.0, r"a {b} c\d")];
        let plan = plan_burn_in(&entries, SubtitleStyle::Default, &BurnInOptions::default()).unwrap();
        assert_eq!(plan.srt_document, "1\n00:00:00,000 --> 00:00:01,000\na \\{b\\} c\\\\d\n\n");
        assert_eq!(entries[0].text, r"a {b} c\d");
    }

    #[test]
    fn plan_rejects_bad_options() {
        let entries = [entry(0, 0.0, 1.0, "x")];
        let bad_size = BurnInOptions {
            font_size: 0,
            ..BurnInOptions::default()
        };
        assert!(plan_burn_in(&entries, SubtitleStyle::Bold, &bad_size).is_err());
        let bad_color = BurnInOptions {
            font_color: "not-a-color".into(),
            ..BurnInOptions::default()
        };
        let err = plan_burn_in(&entries, SubtitleStyle::Bold, &bad_color).unwrap_err();
        assert_eq!(err.to_string(), "font_color: Unsupported color: not-a-color");
    }

    #[test]
    fn planning_is_deterministic() {
        let entries = [entry(0, 0.0, 1.0, "x"), entry(1, 1.0, 2.0, "y")];
        let options = BurnInOptions::default();
        for style in SubtitleStyle::ALL {
            assert_eq!(
                plan_burn_in(&entries, style, &options).unwrap(),
                plan_burn_in(&entries, style, &options).unwrap()
            );
        }
    }

    fn completed_project(store: &ProjectStore, dir: &std::path::Path) -> Uuid {
        let project = store.create("Talk", "", "en").unwrap();
        let source = dir.join("talk.mp4");
        std::fs::write(&source, b"video").unwrap();
        crate::media::ingest_video(
            store,
            &FakeMedia::default(),
            &crate::config::UploadConfig::default(),
            project.id,
            &source,
        )
        .unwrap();
        store.update(project.id, |p| p.dispatch()).unwrap();
        store
            .update(project.id, |p| {
                p.complete_transcription(vec![NewEntry {
                    start_time: 0.0,
                    end_time: 1.0,
                    text: "Hello".into(),
                    language: "en".into(),
                    confidence: None,
                }])
            })
            .unwrap();
        project.id
    }

    fn temp_files(store: &ProjectStore) -> usize {
        std::fs::read_dir(store.paths().temp_dir().unwrap()).unwrap().count()
    }

    #[tokio::test]
    async fn burn_in_records_embedded_export() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::open(Paths::new(dir.path().join("data")), OverlapPolicy::Tolerate).unwrap();
        let id = completed_project(&store, dir.path());
        let media = Arc::new(FakeMedia::default());

        let export = burn_in_project(&store, media.clone(), id, SubtitleStyle::Modern, &BurnInOptions::default())
            .await
            .unwrap();
        assert_eq!(export.format, ExportFormat::EmbeddedVideo);
        assert_eq!(export.style, Some(SubtitleStyle::Modern));
        assert!(export.path.exists());
        assert!(export
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("talk_with_subtitles_"));
        assert_eq!(temp_files(&store), 0);

        let filters = media.filters.lock().unwrap();
        assert!(filters[0].starts_with("subtitles=filename="));
        assert!(filters[0].contains("BorderStyle=3"));
    }

    #[tokio::test]
    async fn concurrent_burn_ins_write_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::open(Paths::new(dir.path().join("data")), OverlapPolicy::Tolerate).unwrap();
        let id = completed_project(&store, dir.path());
        let media: Arc<dyn MediaToolkit> = Arc::new(FakeMedia::default());
        let options = BurnInOptions::default();

        let (a, b) = tokio::join!(
            burn_in_project(&store, media.clone(), id, SubtitleStyle::Bold, &options),
            burn_in_project(&store, media.clone(), id, SubtitleStyle::Minimal, &options),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.id, b.id);
        assert_ne!(a.path, b.path);
        for export in [&a, &b] {
            let name = export.path.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.ends_with(&format!("_{}.mp4", export.id)), "{name}");
            assert!(export.path.exists());
        }

        let project = store.get(id).unwrap();
        assert_eq!(project.exports().len(), 2);
        assert!(project.exports().contains(&a));
        assert!(project.exports().contains(&b));
    }

    #[tokio::test]
    async fn failed_burn_in_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::open(Paths::new(dir.path().join("data")), OverlapPolicy::Tolerate).unwrap();
        let id = completed_project(&store, dir.path());
        let media = Arc::new(FakeMedia {
            fail_burn_in: true,
            ..FakeMedia::default()
        });

        let err = burn_in_project(&store, media, id, SubtitleStyle::Default, &BurnInOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Media(_)));
        assert_eq!(temp_files(&store), 0);
        assert_eq!(std::fs::read_dir(store.paths().exports_dir().unwrap()).unwrap().count(), 0);
        assert!(store.get(id).unwrap().exports().is_empty());
    }

    #[tokio::test]
    async fn burn_in_requires_completed_project() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::open(Paths::new(dir.path().join("data")), OverlapPolicy::Tolerate).unwrap();
        let project = store.create("Talk", "", "en").unwrap();
        let err = burn_in_project(
            &store,
            Arc::new(FakeMedia::default()),
            project.id,
            SubtitleStyle::Default,
            &BurnInOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }
}
