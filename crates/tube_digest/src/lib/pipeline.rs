//! The staged processing graph that turns a video id into a summary.
//!
//! Five workers connected by bounded queues:
//!
//! ```text
//! intake ─► acquire ─┬─ captions ──────────────► summarize ─► finalize
//!                    └─ audio ─► transcribe ───►
//! ```
//!
//! Intake, acquire and transcribe each process one job at a time; summarize
//! fans out one task per job. A failure (returned error or panic) inside one
//! job's work is posted to the error channel and only fails that job.

pub mod builder;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;

use crate::adapters::{AudioSegmenter, MediaSource, SourceEvent, Summarizer, Transcriber};
use crate::job::registry::JobRegistry;
use crate::job::{JobStatus, SummaryJob};
use crate::paths::ContentPaths;
use crate::transcript::{self, Segment};

pub use builder::SummaryPipelineBuilder;

/// Capacity of each inter-stage queue. Sized generously; only the intake
/// queue is expected to reject under pressure.
const STAGE_QUEUE_CAPACITY: usize = 1024;
const ERROR_QUEUE_CAPACITY: usize = 10;

/// A stage failure captured by the guard around one job's work.
struct StageError {
    stage: &'static str,
    job: Arc<SummaryJob>,
    cause: anyhow::Error,
}

/// Where acquire hands a job next.
enum AcquireRoute {
    Summarize,
    Transcribe,
}

pub struct SummaryPipeline<M, G, T, S> {
    registry: Arc<JobRegistry>,
    paths: ContentPaths,
    source: M,
    segmenter: G,
    transcriber: T,
    summarizer: S,
    intake_capacity: usize,
}

impl<M, G, T, S> SummaryPipeline<M, G, T, S>
where
    M: MediaSource + Send + Sync + 'static,
    G: AudioSegmenter + Send + Sync + 'static,
    T: Transcriber + Send + Sync + 'static,
    S: Summarizer + Send + Sync + 'static,
{
    /// Spawns every stage worker and returns the intake sender. A full
    /// intake queue surfaces as a `try_send` error at the HTTP boundary.
    pub fn start(self) -> mpsc::Sender<String> {
        let (intake_tx, intake_rx) = mpsc::channel(self.intake_capacity);
        let (pending_tx, pending_rx) = mpsc::channel(STAGE_QUEUE_CAPACITY);
        let (downloaded_tx, downloaded_rx) = mpsc::channel(STAGE_QUEUE_CAPACITY);
        let (summarizable_tx, summarizable_rx) = mpsc::channel(STAGE_QUEUE_CAPACITY);
        let (done_tx, done_rx) = mpsc::channel(STAGE_QUEUE_CAPACITY);
        let (err_tx, err_rx) = mpsc::channel(ERROR_QUEUE_CAPACITY);

        let registry = Arc::clone(&self.registry);
        let stages = Arc::new(Stages {
            registry: self.registry,
            paths: self.paths,
            source: self.source,
            segmenter: self.segmenter,
            transcriber: self.transcriber,
            summarizer: self.summarizer,
            err_tx,
        });

        {
            let stages = Arc::clone(&stages);
            tokio::spawn(async move { stages.intake(intake_rx, pending_tx).await });
        }
        {
            let stages = Arc::clone(&stages);
            let summarizable_tx = summarizable_tx.clone();
            tokio::spawn(async move {
                stages
                    .acquire(pending_rx, summarizable_tx, downloaded_tx)
                    .await
            });
        }
        {
            let stages = Arc::clone(&stages);
            tokio::spawn(async move { stages.transcribe(downloaded_rx, summarizable_tx).await });
        }
        {
            let stages = Arc::clone(&stages);
            tokio::spawn(async move { stages.summarize(summarizable_rx, done_tx).await });
        }
        {
            let stages = Arc::clone(&stages);
            tokio::spawn(async move { stages.finalize(done_rx).await });
        }
        tokio::spawn(consume_errors(registry, err_rx));

        intake_tx
    }
}

/// Everything the workers share.
struct Stages<M, G, T, S> {
    registry: Arc<JobRegistry>,
    paths: ContentPaths,
    source: M,
    segmenter: G,
    transcriber: T,
    summarizer: S,
    err_tx: mpsc::Sender<StageError>,
}

impl<M, G, T, S> Stages<M, G, T, S>
where
    M: MediaSource + Send + Sync + 'static,
    G: AudioSegmenter + Send + Sync + 'static,
    T: Transcriber + Send + Sync + 'static,
    S: Summarizer + Send + Sync + 'static,
{
    /// Runs one job's stage work, converting returned errors and panics into
    /// a [`StageError`] so the worker loop survives. Returns the stage value
    /// on success.
    async fn guard<R>(
        &self,
        stage: &'static str,
        job: &Arc<SummaryJob>,
        work: impl std::future::Future<Output = anyhow::Result<R>>,
    ) -> Option<R> {
        let cause = match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(error)) => error,
            Err(panic) => anyhow::anyhow!("{}", panic_message(panic.as_ref())),
        };

        let failure = StageError {
            stage,
            job: Arc::clone(job),
            cause,
        };
        if self.err_tx.send(failure).await.is_err() {
            tracing::error!(stage, "Error channel closed, dropping stage failure");
        }
        None
    }

    async fn intake(
        &self,
        mut rx: mpsc::Receiver<String>,
        pending_tx: mpsc::Sender<Arc<SummaryJob>>,
    ) {
        while let Some(video_id) = rx.recv().await {
            let (existed, job) = self.registry.create_or_revive(&video_id);
            if existed {
                tracing::info!(%video_id, "Video already has a live job");
                continue;
            }

            tracing::info!(%video_id, "Queued for processing");
            if pending_tx.send(job).await.is_err() {
                return;
            }
        }
    }

    // One acquisition at a time; the downloader is a scarce resource.
    async fn acquire(
        &self,
        mut rx: mpsc::Receiver<Arc<SummaryJob>>,
        summarizable_tx: mpsc::Sender<Arc<SummaryJob>>,
        downloaded_tx: mpsc::Sender<Arc<SummaryJob>>,
    ) {
        while let Some(job) = rx.recv().await {
            match self.guard("acquire", &job, self.acquire_one(&job)).await {
                Some(AcquireRoute::Summarize) => {
                    if summarizable_tx.send(job).await.is_err() {
                        return;
                    }
                }
                Some(AcquireRoute::Transcribe) => {
                    if downloaded_tx.send(job).await.is_err() {
                        return;
                    }
                }
                None => {}
            }
        }
    }

    async fn acquire_one(&self, job: &Arc<SummaryJob>) -> anyhow::Result<AcquireRoute> {
        let video_id = job.video_id().to_string();
        self.registry
            .mutate(job, |state| state.status = JobStatus::CheckingForCaptions);

        // Existing artifacts short-circuit the network entirely.
        if self.paths.transcription(&video_id).exists() {
            tracing::info!(%video_id, "Transcription artifact present, skipping acquisition");
            self.registry
                .mutate(job, |state| state.status = JobStatus::DownloadedCaptions);
            return Ok(AcquireRoute::Summarize);
        }
        if self.paths.audio(&video_id).exists() {
            tracing::info!(%video_id, "Audio artifact present, skipping download");
            self.registry
                .mutate(job, |state| state.status = JobStatus::DownloadingAudio);
            self.registry
                .mutate(job, |state| state.status = JobStatus::ExtractingAudio);
            return Ok(AcquireRoute::Transcribe);
        }

        let outcome = self
            .source
            .fetch(&video_id, |event| self.apply_source_event(job, event))
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;

        Ok(if outcome.captions_ready {
            AcquireRoute::Summarize
        } else {
            AcquireRoute::Transcribe
        })
    }

    fn apply_source_event(&self, job: &SummaryJob, event: SourceEvent) {
        match event {
            SourceEvent::CaptionsFound => self.registry.mutate(job, |state| {
                state.status = JobStatus::DownloadedCaptions;
                state.progress.had_captions = true;
            }),
            SourceEvent::DownloadStarted => self
                .registry
                .mutate(job, |state| state.status = JobStatus::DownloadingAudio),
            SourceEvent::DownloadProgress(percentage) => self.registry.mutate(job, |state| {
                state.progress.percentage_string = percentage;
            }),
            SourceEvent::ExtractingAudio => self
                .registry
                .mutate(job, |state| state.status = JobStatus::ExtractingAudio),
            SourceEvent::Metadata(meta) => self.registry.mutate(job, |state| {
                state.progress.video_meta = Some(meta);
            }),
        }
    }

    // One transcription at a time.
    async fn transcribe(
        &self,
        mut rx: mpsc::Receiver<Arc<SummaryJob>>,
        summarizable_tx: mpsc::Sender<Arc<SummaryJob>>,
    ) {
        while let Some(job) = rx.recv().await {
            if self
                .guard("transcribe", &job, self.transcribe_one(&job))
                .await
                .is_some()
                && summarizable_tx.send(job).await.is_err()
            {
                return;
            }
        }
    }

    async fn transcribe_one(&self, job: &Arc<SummaryJob>) -> anyhow::Result<()> {
        let video_id = job.video_id().to_string();

        let artifact = self.paths.transcription(&video_id);
        if artifact.exists() {
            tracing::info!(%video_id, "Already transcribed, skipping");
            return Ok(());
        }

        self.registry
            .mutate(job, |state| state.status = JobStatus::Chunking);

        let chunks_dir = self.paths.chunks_dir(&video_id);
        let chunks = self
            .segmenter
            .split(&self.paths.audio(&video_id), &chunks_dir)
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;

        self.registry.mutate(job, |state| {
            state.status = JobStatus::Transcribing;
            state.progress.transcription_chunks = chunks.len();
        });

        let mut segments: Vec<Segment> = Vec::new();
        let mut offset = 0.0_f64;
        let mut context: Option<String> = None;

        for (index, chunk) in chunks.iter().enumerate() {
            let mut chunk_segments = self
                .transcriber
                .transcribe(chunk, context.as_deref())
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;

            // Shift into the merged timeline so timestamps stay contiguous.
            for segment in &mut chunk_segments {
                segment.start += offset;
                segment.end += offset;
            }

            context = Some(
                chunk_segments
                    .iter()
                    .map(|s| s.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
            );
            segments.extend(chunk_segments);

            self.registry.mutate(job, |state| {
                state.progress.transcription_chunks_done = index + 1;
            });

            // Chunks have a fixed duration, so the offset advances by a
            // constant step.
            offset += f64::from(G::CHUNK_SECONDS);
        }

        transcript::write_segments(&artifact, &segments)?;

        if chunks_dir.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(&chunks_dir).await {
                tracing::warn!(error = %e, %video_id, "Failed to clean up chunk directory");
            }
        }
        Ok(())
    }

    // Summaries run in parallel; the model service does not rate limit us.
    async fn summarize(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<Arc<SummaryJob>>,
        done_tx: mpsc::Sender<Arc<SummaryJob>>,
    ) {
        while let Some(job) = rx.recv().await {
            let stages = Arc::clone(&self);
            let done_tx = done_tx.clone();
            tokio::spawn(async move {
                if stages
                    .guard("summarize", &job, stages.summarize_one(&job))
                    .await
                    .is_some()
                {
                    let _ = done_tx.send(job).await;
                }
            });
        }
    }

    async fn summarize_one(&self, job: &Arc<SummaryJob>) -> anyhow::Result<()> {
        let video_id = job.video_id().to_string();
        tracing::info!(%video_id, "Summarizing");
        self.registry
            .mutate(job, |state| state.status = JobStatus::Summarizing);

        let segments = transcript::read_segments(&self.paths.transcription(&video_id))?;
        let chunks = transcript::chunk_segments(&segments);
        self.registry.mutate(job, |state| {
            state.progress.summary_chunks = chunks.len();
        });

        let mut current = String::new();
        for (index, chunk) in chunks.iter().enumerate() {
            current = self
                .summarizer
                .extend_summary(chunk, &current)
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;

            self.registry.mutate(job, |state| {
                state.progress.summary_chunks_done = index + 1;
            });
        }

        crate::paths::write_atomic(&self.paths.summary(&video_id), current.as_bytes())?;
        Ok(())
    }

    async fn finalize(&self, mut rx: mpsc::Receiver<Arc<SummaryJob>>) {
        while let Some(job) = rx.recv().await {
            tracing::info!(video_id = job.video_id(), "All stages completed");
            self.registry
                .mutate(&job, |state| state.status = JobStatus::Finished);
            self.registry.record_success(job.video_id());
        }
    }
}

/// Turns stage failures into `failed` jobs and persists the failure. Other
/// jobs keep flowing while this runs.
async fn consume_errors(registry: Arc<JobRegistry>, mut rx: mpsc::Receiver<StageError>) {
    while let Some(StageError { stage, job, cause }) = rx.recv().await {
        tracing::error!(video_id = job.video_id(), stage, error = %cause, "Stage failed");

        let message = cause.to_string();
        registry.mutate(&job, |state| {
            state.status = JobStatus::Failed;
            state.error = message.clone();
        });
        registry.record_failure(job.video_id(), &message);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "stage panicked".to_string()
    }
}
