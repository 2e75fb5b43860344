//! Media acquisition through the `yt-dlp` binary and audio segmentation
//! through `ffmpeg`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use video_datastore::VideoMetaEntry;

use super::{AudioSegmenter, FetchOutcome, MediaSource, SourceEvent};
use crate::captions;
use crate::paths::ContentPaths;
use crate::transcript;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

// yt-dlp progress lines look like "[download]  37.4% of 12.34MiB at ...".
static PROGRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?%)").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum YtDlpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{tool} failed: {detail}")]
    ToolFailed { tool: &'static str, detail: String },
    #[error("invalid metadata sidecar: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("caption artifact error: {0}")]
    Captions(#[from] crate::error::Error),
    #[error("downloader did not produce {0}")]
    MissingArtifact(PathBuf),
}

/// [`MediaSource`] that drives the `yt-dlp` binary.
///
/// Acquisition is two-phase: a caption probe that writes subtitle and
/// metadata sidecars without touching media, then, captions absent, an
/// audio download whose progress lines are streamed back as events.
pub struct YtDlpSource {
    bin: PathBuf,
    paths: ContentPaths,
}

impl YtDlpSource {
    pub fn new(bin: impl Into<PathBuf>, paths: ContentPaths) -> Self {
        YtDlpSource {
            bin: bin.into(),
            paths,
        }
    }

    fn output_template(&self, video_id: &str) -> String {
        format!(
            "{}/{video_id}.%(ext)s",
            self.paths.downloads_dir().display()
        )
    }

    /// Triggers caption + info.json generation without downloading media,
    /// then looks for the converted `.vtt`.
    async fn probe_captions(&self, video_id: &str) -> Result<Option<PathBuf>, YtDlpError> {
        let output = Command::new(&self.bin)
            .args([
                "--write-auto-subs",
                "--write-subs",
                "--skip-download",
                "--write-info-json",
                "--sub-langs",
                "en,en.*",
                "--convert-subs",
                "vtt",
                "--limit-rate",
                "1M",
                "--quiet",
                "-o",
                &self.output_template(video_id),
                &format!("{WATCH_URL}{video_id}"),
            ])
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(YtDlpError::ToolFailed {
                tool: "yt-dlp",
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        self.find_caption_file(video_id)
    }

    fn find_caption_file(&self, video_id: &str) -> Result<Option<PathBuf>, YtDlpError> {
        let prefix = format!("{video_id}.");
        for entry in std::fs::read_dir(self.paths.downloads_dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.to_ascii_lowercase().ends_with(".vtt") {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }

    /// Downloads and extracts the audio track, forwarding progress lines.
    async fn download_audio<F>(&self, video_id: &str, on_event: &F) -> Result<(), YtDlpError>
    where
        F: Fn(SourceEvent) + Send + Sync,
    {
        let mut child = Command::new(&self.bin)
            .args([
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--write-info-json",
                "--limit-rate",
                "1M",
                "--newline",
                "--progress",
                "-o",
                &self.output_template(video_id),
                &format!("{WATCH_URL}{video_id}"),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            let mut extracting = false;
            while let Some(line) = lines.next_line().await? {
                if let Some(caps) = PROGRESS_RE.captures(&line) {
                    on_event(SourceEvent::DownloadProgress(caps[1].to_string()));
                } else if !extracting && line.starts_with("[ExtractAudio]") {
                    extracting = true;
                    on_event(SourceEvent::ExtractingAudio);
                }
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(YtDlpError::ToolFailed {
                tool: "yt-dlp",
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let audio = self.paths.audio(video_id);
        if !audio.exists() {
            return Err(YtDlpError::MissingArtifact(audio));
        }
        Ok(())
    }

    /// Maps the downloader's `.info.json` sidecar into a metadata entry.
    fn read_info_json(&self, video_id: &str) -> Result<VideoMetaEntry, YtDlpError> {
        let raw = std::fs::read(self.paths.info_json(video_id))?;
        let info: InfoJson = serde_json::from_slice(&raw)?;
        Ok(info.into_entry())
    }

    /// Formats the probed captions into the transcription artifact and
    /// removes the raw subtitle file.
    async fn format_captions(&self, vtt_path: &Path, video_id: &str) -> Result<(), YtDlpError> {
        let content = tokio::fs::read_to_string(vtt_path).await?;
        let segments = captions::parse_vtt(&content);
        transcript::write_segments(&self.paths.transcription(video_id), &segments)?;
        tokio::fs::remove_file(vtt_path).await?;
        Ok(())
    }
}

impl MediaSource for YtDlpSource {
    type Error = YtDlpError;

    async fn fetch<F>(&self, video_id: &str, on_event: F) -> Result<FetchOutcome, Self::Error>
    where
        F: Fn(SourceEvent) + Send + Sync,
    {
        let vtt = self.probe_captions(video_id).await?;

        // The probe writes the metadata sidecar on both paths.
        match self.read_info_json(video_id) {
            Ok(meta) => on_event(SourceEvent::Metadata(meta)),
            Err(e) => tracing::warn!(error = %e, %video_id, "No usable metadata sidecar"),
        }

        match vtt {
            Some(path) => {
                tracing::info!(%video_id, "Captions available, skipping media download");
                on_event(SourceEvent::CaptionsFound);
                self.format_captions(&path, video_id).await?;
                Ok(FetchOutcome {
                    captions_ready: true,
                })
            }
            None => {
                tracing::info!(%video_id, "No captions, downloading audio");
                on_event(SourceEvent::DownloadStarted);
                self.download_audio(video_id, &on_event).await?;
                Ok(FetchOutcome {
                    captions_ready: false,
                })
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    /// `YYYYMMDD`.
    #[serde(default)]
    upload_date: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    #[serde(default)]
    url: String,
}

impl InfoJson {
    fn into_entry(self) -> VideoMetaEntry {
        let thumbnail = self
            .thumbnail
            .filter(|url| !url.is_empty())
            .or_else(|| self.thumbnails.into_iter().last().map(|t| t.url))
            .unwrap_or_default();

        VideoMetaEntry {
            video_id: self.id,
            video_thumbnail_url: thumbnail,
            video_name: self.title.unwrap_or_default(),
            creator_name: self.uploader.unwrap_or_default(),
            length: self.duration.unwrap_or_default(),
            upload_date: format_upload_date(self.upload_date.unwrap_or_default()),
            ..Default::default()
        }
    }
}

fn format_upload_date(raw: String) -> String {
    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}-{}-{}", &raw[0..4], &raw[4..6], &raw[6..8])
    } else {
        raw
    }
}

/// [`AudioSegmenter`] backed by ffmpeg's segment muxer.
pub struct FfmpegSegmenter {
    bin: PathBuf,
}

impl FfmpegSegmenter {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        FfmpegSegmenter { bin: bin.into() }
    }
}

impl Default for FfmpegSegmenter {
    fn default() -> Self {
        FfmpegSegmenter::new("ffmpeg")
    }
}

impl AudioSegmenter for FfmpegSegmenter {
    type Error = YtDlpError;

    async fn split(&self, audio: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, Self::Error> {
        tokio::fs::create_dir_all(out_dir).await?;

        let segment_time = Self::CHUNK_SECONDS.to_string();
        let output = Command::new(&self.bin)
            .arg("-y")
            .arg("-i")
            .arg(audio)
            .args([
                "-vn",
                "-c:a",
                "libmp3lame",
                "-b:a",
                "96k",
                "-f",
                "segment",
                "-segment_time",
                &segment_time,
                "-reset_timestamps",
                "1",
                "-map",
                "0:a:0",
            ])
            .arg(out_dir.join("%03d.mp3"))
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(YtDlpError::ToolFailed {
                tool: "ffmpeg",
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let mut chunks = Vec::new();
        let mut entries = tokio::fs::read_dir(out_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                chunks.push(entry.path());
            }
        }
        chunks.sort();
        Ok(chunks)
    }
}
