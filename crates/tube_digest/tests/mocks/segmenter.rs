use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tube_digest::adapters::AudioSegmenter;

/// Produces `chunk_count` dummy chunk files.
#[derive(Clone)]
pub struct MockSegmenter {
    pub chunk_count: usize,
    pub calls: Arc<Mutex<Vec<PathBuf>>>,
    pub fail_with: Option<String>,
}

impl MockSegmenter {
    pub fn new(chunk_count: usize) -> Self {
        Self {
            chunk_count,
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::new(0)
        }
    }
}

impl AudioSegmenter for MockSegmenter {
    type Error = anyhow::Error;

    async fn split(&self, audio: &Path, out_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        self.calls.lock().unwrap().push(audio.to_path_buf());
        if let Some(ref msg) = self.fail_with {
            anyhow::bail!("{msg}");
        }

        std::fs::create_dir_all(out_dir)?;
        let mut chunks = Vec::new();
        for index in 0..self.chunk_count {
            let path = out_dir.join(format!("{index:03}.mp3"));
            std::fs::write(&path, b"mock chunk")?;
            chunks.push(path);
        }
        Ok(chunks)
    }
}
