//! In-memory job records for the summarization pipeline.

pub mod hub;
pub mod registry;

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use video_datastore::VideoMetaEntry;

/// Lifecycle states of a summary job. The wire labels are contractual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    CheckingForCaptions,
    DownloadedCaptions,
    DownloadingAudio,
    ExtractingAudio,
    Chunking,
    Transcribing,
    Summarizing,
    Finished,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::CheckingForCaptions => "checking_for_captions",
            JobStatus::DownloadedCaptions => "downloaded_captions",
            JobStatus::DownloadingAudio => "downloading_audio",
            JobStatus::ExtractingAudio => "extracting_audio",
            JobStatus::Chunking => "chunking",
            JobStatus::Transcribing => "transcribing",
            JobStatus::Summarizing => "summarizing",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress counters and acquisition details exposed to subscribers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobProgress {
    #[serde(rename = "VideoMeta")]
    pub video_meta: Option<VideoMetaEntry>,
    /// Free-form downloader progress, e.g. `"37.4%"`.
    pub percentage_string: String,

    pub had_captions: bool,
    pub transcription_chunks: usize,
    #[serde(rename = "transcription_chunks_transcribed")]
    pub transcription_chunks_done: usize,

    pub summary_chunks: usize,
    #[serde(rename = "summary_chunks_transcribed")]
    pub summary_chunks_done: usize,
}

/// The mutable portion of a job, always accessed under its lock.
#[derive(Debug)]
pub struct JobState {
    pub status: JobStatus,
    pub error: String,
    pub progress: JobProgress,
}

impl JobState {
    fn new() -> Self {
        JobState {
            status: JobStatus::Pending,
            error: String::new(),
            progress: JobProgress::default(),
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = JobState::new();
    }

    pub(crate) fn snapshot(&self, video_id: &str) -> JobSnapshot {
        JobSnapshot {
            video_id: video_id.to_string(),
            status: self.status,
            error: self.error.clone(),
            progress: self.progress.clone(),
        }
    }
}

/// One video's processing record.
///
/// All mutation goes through [`registry::JobRegistry::mutate`], which holds
/// the state lock across the edit and the subscriber broadcast so observers
/// see every update in order.
#[derive(Debug)]
pub struct SummaryJob {
    video_id: String,
    state: Mutex<JobState>,
}

impl SummaryJob {
    pub(crate) fn new(video_id: impl Into<String>) -> Self {
        SummaryJob {
            video_id: video_id.into(),
            state: Mutex::new(JobState::new()),
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.lock().snapshot(&self.video_id)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap()
    }
}

/// Serializable copy of a job, taken under its lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub video_id: String,
    pub status: JobStatus,
    pub error: String,
    #[serde(rename = "job_progress")]
    pub progress: JobProgress,
}
