//! Deterministic on-disk layout for everything derived from a video id.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct ContentPaths {
    root: PathBuf,
}

impl ContentPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ContentPaths { root: root.into() }
    }

    /// Creates the artifact directories if missing.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            self.downloads_dir(),
            self.transcriptions_dir(),
            self.summaries_dir(),
            self.chats_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The metadata store document.
    pub fn db_file(&self) -> PathBuf {
        self.root.join("db.json")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join("downloads")
    }

    pub fn transcriptions_dir(&self) -> PathBuf {
        self.root.join("transcriptions")
    }

    pub fn summaries_dir(&self) -> PathBuf {
        self.root.join("summaries")
    }

    pub fn chats_dir(&self) -> PathBuf {
        self.root.join("chats")
    }

    /// Downloaded audio track.
    pub fn audio(&self, video_id: &str) -> PathBuf {
        self.downloads_dir().join(format!("{video_id}.mp3"))
    }

    /// Metadata sidecar written by the downloader.
    pub fn info_json(&self, video_id: &str) -> PathBuf {
        self.downloads_dir().join(format!("{video_id}.info.json"))
    }

    /// Transient directory holding fixed-duration audio chunks.
    pub fn chunks_dir(&self, video_id: &str) -> PathBuf {
        self.downloads_dir().join(video_id)
    }

    /// Merged transcript segment list.
    pub fn transcription(&self, video_id: &str) -> PathBuf {
        self.transcriptions_dir().join(format!("{video_id}.json"))
    }

    /// Finished summary markdown.
    pub fn summary(&self, video_id: &str) -> PathBuf {
        self.summaries_dir().join(format!("{video_id}.md"))
    }

    /// Persistent chat transcript.
    pub fn chat(&self, video_id: &str) -> PathBuf {
        self.chats_dir().join(format!("{video_id}.json"))
    }
}

/// True when `id` can be embedded in an artifact path without escaping it.
pub fn is_safe_video_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Replaces `path` atomically: the content is written to a temporary file in
/// the same directory, synced, and renamed over the target.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}
