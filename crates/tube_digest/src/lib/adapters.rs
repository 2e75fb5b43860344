//! Contracts between the stage workers and the outside world.
//!
//! Workers own job state and status transitions; adapters only perform I/O
//! and report facts through typed events. Implementations live in
//! [`groq`] and [`ytdlp`]; tests substitute mocks.

pub mod groq;
pub mod ytdlp;

use std::fmt::{Debug, Display};
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use video_datastore::VideoMetaEntry;

use crate::transcript::Segment;

/// Facts reported by a [`MediaSource`] while acquiring a video.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// Usable captions were found; the transcription artifact is being
    /// produced directly from them.
    CaptionsFound,
    /// No captions; an audio download has started.
    DownloadStarted,
    /// Free-form progress from the downloader, e.g. `"37.4%"`.
    DownloadProgress(String),
    /// The download finished and the audio track is being extracted.
    ExtractingAudio,
    /// Video metadata became available.
    Metadata(VideoMetaEntry),
}

/// How acquisition concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOutcome {
    /// The transcription artifact was produced directly from captions, so
    /// the transcription stage can be skipped entirely.
    pub captions_ready: bool,
}

/// Probes for captions and, failing that, acquires the audio track.
pub trait MediaSource {
    type Error: Debug + Display + Send + Sync + 'static;

    fn fetch<F>(
        &self,
        video_id: &str,
        on_event: F,
    ) -> impl Future<Output = Result<FetchOutcome, Self::Error>> + Send
    where
        F: Fn(SourceEvent) + Send + Sync;
}

/// Splits an audio file into fixed-duration chunks for transcription.
pub trait AudioSegmenter {
    /// Duration of one chunk in seconds.
    const CHUNK_SECONDS: u32 = 1200;

    type Error: Debug + Display + Send + Sync + 'static;

    /// Returns the chunk paths in playback order.
    fn split(
        &self,
        audio: &Path,
        out_dir: &Path,
    ) -> impl Future<Output = Result<Vec<PathBuf>, Self::Error>> + Send;
}

/// Speech-to-text over one audio chunk.
pub trait Transcriber {
    type Error: Debug + Display + Send + Sync + 'static;

    /// Transcribes `chunk`. `context` carries the previous chunk's text so
    /// the model keeps spelling and style consistent across boundaries.
    /// Returned timestamps are relative to the chunk start.
    fn transcribe(
        &self,
        chunk: &Path,
        context: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Segment>, Self::Error>> + Send;
}

/// One rolling-summary step.
pub trait Summarizer {
    type Error: Debug + Display + Send + Sync + 'static;

    /// Folds `section` into `current_summary` and returns the new summary.
    fn extend_summary(
        &self,
        section: &str,
        current_summary: &str,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

/// A single turn in a chat conversation, shared between the wire format and
/// the persistent transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub content: String,
    pub role: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            content: content.into(),
            role: "system".to_string(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            content: content.into(),
            role: "user".to_string(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            content: content.into(),
            role: "assistant".to_string(),
        }
    }
}

/// Streaming chat completion.
pub trait ChatModel {
    type Error: Debug + Display + Send + Sync + 'static;

    /// Streams the model's reply, invoking `on_token` for every content
    /// delta in arrival order.
    fn stream_reply<F>(
        &self,
        messages: &[ChatMessage],
        on_token: F,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send
    where
        F: Fn(&str) + Send + Sync;
}
