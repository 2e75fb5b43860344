use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tube_digest::adapters::Transcriber;
use tube_digest::transcript::Segment;

/// Returns the same segment list for every chunk, timestamps relative to
/// the chunk start.
#[derive(Clone)]
pub struct MockTranscriber {
    pub segments_per_chunk: Vec<Segment>,
    pub calls: Arc<Mutex<Vec<(PathBuf, Option<String>)>>>,
    pub fail_with: Option<String>,
}

impl MockTranscriber {
    pub fn new(text: &str) -> Self {
        Self {
            segments_per_chunk: vec![Segment {
                start: 0.0,
                end: 5.0,
                text: text.to_string(),
            }],
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::new("")
        }
    }
}

impl Transcriber for MockTranscriber {
    type Error = anyhow::Error;

    async fn transcribe(
        &self,
        chunk: &Path,
        context: Option<&str>,
    ) -> anyhow::Result<Vec<Segment>> {
        self.calls
            .lock()
            .unwrap()
            .push((chunk.to_path_buf(), context.map(str::to_string)));
        if let Some(ref msg) = self.fail_with {
            anyhow::bail!("{msg}");
        }
        Ok(self.segments_per_chunk.clone())
    }
}
