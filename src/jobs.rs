//! Background transcription jobs.
//!
//! Dispatch moves a project to `processing` and puts a job on a bounded
//! queue. A single worker runs the jobs in order: extract audio, recognize,
//! load the timeline, mark the project completed. Any error marks it failed.

use crate::error::{Error, Result};
use crate::store::ProjectStore;
use crate::transcription::TranscriptionAdapter;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// What a job needs to run.
pub struct PipelineContext {
    pub store: Arc<ProjectStore>,
    pub adapter: TranscriptionAdapter,
    /// Attempts at persisting a failure.
    pub status_write_retries: u32,
}

struct TranscriptionJob {
    project_id: Uuid,
    reply: oneshot::Sender<Result<usize>>,
}

/// Awaitable outcome of one dispatched job.
pub struct JobTicket {
    pub project_id: Uuid,
    rx: oneshot::Receiver<Result<usize>>,
}

impl JobTicket {
    /// Number of subtitles loaded, or the error that failed the job.
    pub async fn wait(self) -> Result<usize> {
        self.rx
            .await
            .map_err(|_| Error::InvalidState("transcription worker stopped before replying".into()))?
    }
}

pub struct JobQueue {
    tx: mpsc::Sender<TranscriptionJob>,
    ctx: Arc<PipelineContext>,
}

impl JobQueue {
    /// Spawn the worker. It stops once every `JobQueue` handle is dropped and
    /// the queue is drained.
    pub fn start(ctx: Arc<PipelineContext>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<TranscriptionJob>(capacity.max(1));
        let worker_ctx = ctx.clone();
        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let outcome = process(&worker_ctx, job.project_id).await;
                if job.reply.send(outcome).is_err() {
                    warn!("[jobs] nobody waiting for project {}", job.project_id);
                }
            }
            info!("[jobs] worker stopped");
        });
        (Self { tx, ctx }, worker)
    }

    /// Move an uploaded project to `processing` and queue its transcription.
    pub async fn dispatch(&self, project_id: Uuid) -> Result<JobTicket> {
        let store = &self.ctx.store;
        store.update(project_id, |project| project.dispatch())?;
        let (reply, rx) = oneshot::channel();
        let job = TranscriptionJob { project_id, reply };
        if self.tx.send(job).await.is_err() {
            let err = Error::InvalidState("transcription worker is not running".into());
            store
                .mark_failed(project_id, &err, self.ctx.status_write_retries)
                .await?;
            return Err(err);
        }
        info!("[jobs] queued transcription of project {}", project_id);
        Ok(JobTicket { project_id, rx })
    }
}

async fn process(ctx: &PipelineContext, project_id: Uuid) -> Result<usize> {
    match run(ctx, project_id).await {
        Ok(count) => {
            info!("[jobs] project {} completed with {} subtitles", project_id, count);
            Ok(count)
        }
        Err(job_error) if job_error.is_not_found() => {
            warn!("[jobs] project {} vanished: {}", project_id, job_error);
            Err(job_error)
        }
        Err(job_error) => {
            error!("[jobs] project {} failed: {}", project_id, job_error);
            ctx.store
                .mark_failed(project_id, &job_error, ctx.status_write_retries)
                .await?;
            Err(job_error)
        }
    }
}

async fn run(ctx: &PipelineContext, project_id: Uuid) -> Result<usize> {
    let lease = ctx.store.video_lease(project_id).await?;
    let language = ctx.store.read(project_id, |project| Ok(project.language.clone()))?;
    let entries = ctx.adapter.transcribe(lease.path(), &language).await?;
    drop(lease);
    ctx.store
        .update(project_id, |project| project.complete_transcription(entries))
}
