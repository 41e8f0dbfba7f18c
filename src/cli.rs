//! Command-line surface.

use crate::config::AppConfig;
use crate::embed::{burn_in_project, BurnInOptions, SubtitleStyle};
use crate::export::{export_project, TextFormat};
use crate::jobs::{JobQueue, PipelineContext};
use crate::media::{ingest_video, FfmpegToolkit, MediaToolkit};
use crate::paths::Paths;
use crate::project::SubtitleProject;
use crate::store::{parse_project_id, ProjectStore};
use crate::timecode::{format_time_srt, parse_timestamp};
use crate::timeline::{EntryId, EntryPatch, NewEntry};
use crate::transcription::{
    build_recognizer, download_model_with_progress, list_installed_model_names, TranscriptionAdapter,
    MODEL_SOURCES,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "subtitle-studio", author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (defaults to <config dir>/subtitle-studio/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create a project from a video and transcribe it
    New {
        /// Video file (mp4, avi, mov, mkv, webm)
        video: PathBuf,
        /// Project name (defaults to the video file name)
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Spoken language code (defaults to the configured language)
        #[arg(short, long)]
        language: Option<String>,
    },
    /// List projects, newest first
    List,
    /// Show a project and its subtitles
    Show { project: String },
    /// Show the processing status of a project
    Status { project: String },
    /// Split a subtitle in two at a time inside it
    Split {
        project: String,
        entry: EntryId,
        /// Seconds or HH:MM:SS,mmm
        #[arg(value_parser = parse_time_arg)]
        at: f64,
    },
    /// Merge a subtitle with the one after it
    Merge { project: String, entry: EntryId },
    /// Change timing, text or language of a subtitle
    Edit {
        project: String,
        entry: EntryId,
        #[arg(long, value_parser = parse_time_arg)]
        start: Option<f64>,
        #[arg(long, value_parser = parse_time_arg)]
        end: Option<f64>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        language: Option<String>,
    },
    /// Add a subtitle by hand
    Insert {
        project: String,
        #[arg(value_parser = parse_time_arg)]
        start: f64,
        #[arg(value_parser = parse_time_arg)]
        end: f64,
        text: String,
        #[arg(long)]
        language: Option<String>,
    },
    /// Remove a subtitle
    RemoveEntry { project: String, entry: EntryId },
    /// Write the subtitles to an srt, vtt or txt file
    Export {
        project: String,
        #[arg(short, long, default_value = "srt")]
        format: TextFormat,
    },
    /// Burn the subtitles into a copy of the video
    Embed {
        project: String,
        /// default, modern, bold or minimal
        #[arg(short, long)]
        style: Option<String>,
        #[arg(long)]
        font_size: Option<u32>,
        #[arg(long)]
        font_color: Option<String>,
        #[arg(long)]
        outline_color: Option<String>,
    },
    /// Delete a project with its exports and video
    Delete {
        project: String,
        /// Leave the stored video on disk
        #[arg(long)]
        keep_video: bool,
    },
    /// Download a whisper model into the models directory
    DownloadModel { name: String },
    /// List known whisper models and which are installed
    Models,
}

fn parse_time_arg(raw: &str) -> Result<f64, String> {
    if raw.contains(':') {
        parse_timestamp(raw).map_err(|e| e.to_string())
    } else {
        raw.trim()
            .parse::<f64>()
            .map_err(|_| format!("not a time: {}", raw))
    }
}

/// Print `value` as JSON, or run `human` to print it for people.
fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

fn stamp(seconds: f64) -> String {
    format_time_srt(seconds).unwrap_or_else(|_| "--:--:--,---".to_string())
}

fn print_project(project: &SubtitleProject) {
    println!("{}  {}", project.id, project.name);
    println!("status:    {}", project.status());
    if let Some(reason) = project.failure_reason() {
        println!("failure:   {}", reason);
    }
    println!("language:  {}", project.language);
    if let Some(video) = project.video() {
        println!("video:     {} ({:.1}s)", video.path.display(), video.duration);
    }
    println!("subtitles: {}", project.subtitle_count());
    for entry in project.timeline().entries() {
        println!(
            "[{}] {} --> {}{}  {}",
            entry.id,
            stamp(entry.start_time),
            stamp(entry.end_time),
            if entry.is_edited { " *" } else { "" },
            entry.text
        );
    }
    for (a, b) in project.timeline().overlaps() {
        println!("warning: subtitles {} and {} overlap", a, b);
    }
    for export in project.exports() {
        println!("export {}: {:?} {}", export.id, export.format, export.path.display());
    }
}

fn media_toolkit(config: &AppConfig) -> Arc<dyn MediaToolkit> {
    Arc::new(FfmpegToolkit::new(config.media.clone()))
}

pub async fn execute(cli: Cli, config: AppConfig, paths: Paths) -> anyhow::Result<()> {
    let store = Arc::new(ProjectStore::open(paths.clone(), config.editor.overlap_policy)?);
    let json = cli.json;

    match cli.command {
        Commands::New {
            video,
            name,
            description,
            language,
        } => {
            let recognizer = build_recognizer(&config.transcription, &paths)
                .await
                .context("cannot set up speech recognition")?;
            let media = media_toolkit(&config);
            let name = name.unwrap_or_else(|| file_stem(&video));
            let language = language.unwrap_or_else(|| config.default_language.clone());
            let project = store.create(&name, &description, &language)?;

            if let Err(e) = ingest_video(&store, media.as_ref(), &config.upload, project.id, &video) {
                if let Err(write) = store
                    .mark_failed(project.id, &e, config.jobs.status_write_retries)
                    .await
                {
                    warn!("[cli] {}", write);
                }
                return Err(e).with_context(|| format!("cannot use {}", video.display()));
            }

            let ctx = Arc::new(PipelineContext {
                store: store.clone(),
                adapter: TranscriptionAdapter::new(media, recognizer, paths.temp_dir()?),
                status_write_retries: config.jobs.status_write_retries,
            });
            let (queue, worker) = JobQueue::start(ctx, config.jobs.queue_capacity);
            let ticket = queue.dispatch(project.id).await?;
            let outcome = ticket.wait().await;
            drop(queue);
            if let Err(e) = worker.await {
                warn!("[cli] worker ended abnormally: {}", e);
            }
            let count = outcome.context("transcription failed")?;
            info!("[cli] project {} ready with {} subtitles", project.id, count);
            emit(json, &store.get(project.id)?, print_project)?;
        }
        Commands::List => {
            emit(json, &store.list()?, |projects| {
                for p in projects {
                    println!("{}  {:<10}  {:>4}  {}", p.id, p.status.to_string(), p.subtitle_count, p.name);
                }
            })?;
        }
        Commands::Show { project } => {
            emit(json, &store.get(parse_project_id(&project)?)?, print_project)?;
        }
        Commands::Status { project } => {
            let project = store.get(parse_project_id(&project)?)?;
            #[derive(Serialize)]
            struct Status<'a> {
                status: String,
                failure_reason: Option<&'a str>,
                subtitle_count: usize,
                is_processing: bool,
                is_completed: bool,
            }
            let status = Status {
                status: project.status().to_string(),
                failure_reason: project.failure_reason(),
                subtitle_count: project.subtitle_count(),
                is_processing: project.is_processing(),
                is_completed: project.is_completed(),
            };
            emit(json, &status, |s| match s.failure_reason {
                Some(reason) => println!("{} ({})", s.status, reason),
                None => println!("{} ({} subtitles)", s.status, s.subtitle_count),
            })?;
        }
        Commands::Split { project, entry, at } => {
            let id = parse_project_id(&project)?;
            let pair = store.update(id, |p| p.edit_timeline()?.split(entry, at))?;
            emit(json, &pair, |(first, second)| {
                println!("[{}] {} --> {}", first.id, stamp(first.start_time), stamp(first.end_time));
                println!("[{}] {} --> {}", second.id, stamp(second.start_time), stamp(second.end_time));
            })?;
        }
        Commands::Merge { project, entry } => {
            let id = parse_project_id(&project)?;
            let outcome = store.update(id, |p| p.edit_timeline()?.merge(entry))?;
            emit(json, &outcome.merged, |merged| {
                println!("merged {} into {}: {}", outcome.removed, merged.id, merged.text)
            })?;
        }
        Commands::Edit {
            project,
            entry,
            start,
            end,
            text,
            language,
        } => {
            let patch = EntryPatch {
                start_time: start,
                end_time: end,
                text,
                language,
            };
            if patch.is_empty() {
                anyhow::bail!("nothing to change: pass --start, --end, --text or --language");
            }
            let id = parse_project_id(&project)?;
            let updated = store.update(id, |p| p.edit_timeline()?.update(entry, patch))?;
            emit(json, &updated, |e| {
                println!("[{}] {} --> {}  {}", e.id, stamp(e.start_time), stamp(e.end_time), e.text)
            })?;
        }
        Commands::Insert {
            project,
            start,
            end,
            text,
            language,
        } => {
            let id = parse_project_id(&project)?;
            let created = store.update(id, |p| {
                let language = language.unwrap_or_else(|| p.language.clone());
                p.edit_timeline()?.insert(NewEntry {
                    start_time: start,
                    end_time: end,
                    text,
                    language,
                    confidence: None,
                })
            })?;
            emit(json, &created, |e| println!("added [{}] {}", e.id, e.text))?;
        }
        Commands::RemoveEntry { project, entry } => {
            let id = parse_project_id(&project)?;
            let removed = store.update(id, |p| p.edit_timeline()?.delete(entry))?;
            emit(json, &removed, |e| println!("removed [{}] {}", e.id, e.text))?;
        }
        Commands::Export { project, format } => {
            let export = export_project(&store, parse_project_id(&project)?, format)?;
            emit(json, &export, |e| println!("{}", e.path.display()))?;
        }
        Commands::Embed {
            project,
            style,
            font_size,
            font_color,
            outline_color,
        } => {
            let style = SubtitleStyle::from_name(style.as_deref().unwrap_or(&config.burn_in.style));
            let defaults = BurnInOptions::from(&config.burn_in);
            let options = BurnInOptions {
                font_size: font_size.unwrap_or(defaults.font_size),
                font_color: font_color.unwrap_or(defaults.font_color),
                outline_color: outline_color.unwrap_or(defaults.outline_color),
            };
            let export = burn_in_project(
                &store,
                media_toolkit(&config),
                parse_project_id(&project)?,
                style,
                &options,
            )
            .await?;
            emit(json, &export, |e| println!("{}", e.path.display()))?;
        }
        Commands::Delete {
            project,
            keep_video,
        } => {
            let id = parse_project_id(&project)?;
            store.delete(id, keep_video).await?;
            emit(json, &serde_json::json!({ "deleted": id }), |_| println!("deleted {}", id))?;
        }
        Commands::DownloadModel { name } => {
            let models_dir = paths.models_dir()?;
            let path = download_model_with_progress(&models_dir, &name, |done, total| match total {
                Some(total) => eprint!("\r{} / {} bytes", done, total),
                None => eprint!("\r{} bytes", done),
            })
            .await?;
            eprintln!();
            emit(json, &path, |p| println!("{}", p.display()))?;
        }
        Commands::Models => {
            #[derive(Serialize)]
            struct ModelInfo {
                name: &'static str,
                installed: bool,
            }
            let installed = list_installed_model_names(&paths.models_dir()?);
            let models: Vec<ModelInfo> = MODEL_SOURCES
                .iter()
                .map(|(name, _)| ModelInfo {
                    name: *name,
                    installed: installed.iter().any(|i| i == name),
                })
                .collect();
            emit(json, &models, |models| {
                for m in models {
                    println!("{:<16}{}", m.name, if m.installed { "installed" } else { "" });
                }
            })?;
        }
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
