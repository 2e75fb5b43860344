//! Timestamped transcript segments and the chunking used for rolling
//! summaries.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::paths;

/// Maximum estimated tokens fed to the model in one summarization step.
pub const MAX_SUMMARY_TOKENS: usize = 30_000;
/// Rough chars-per-token estimate used when sizing summary chunks.
const CHARS_PER_TOKEN: usize = 4;

/// One transcript line with its time span in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Renders seconds as `HH:MM:SS` from one hour upward, `MM:SS` below.
pub fn fmt_hms(total_secs: i64) -> String {
    let secs = total_secs.max(0);
    let (hours, minutes, seconds) = (secs / 3600, (secs / 60) % 60, secs % 60);

    if secs >= 3600 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// `[MM:SS-MM:SS]: text` line as fed to the summarizer.
pub fn format_segment(segment: &Segment) -> String {
    format!(
        "[{}-{}]: {}",
        fmt_hms(segment.start as i64),
        fmt_hms(segment.end as i64),
        segment.text
    )
}

/// Greedily packs formatted segment lines into blocks of roughly
/// [`MAX_SUMMARY_TOKENS`] estimated tokens. Always yields at least one block
/// so the summarizer runs even for an empty transcript.
pub fn chunk_segments(segments: &[Segment]) -> Vec<String> {
    let limit = MAX_SUMMARY_TOKENS * CHARS_PER_TOKEN;

    let mut blocks = Vec::new();
    let mut current = String::new();
    for segment in segments {
        current.push_str(&format_segment(segment));
        current.push('\n');

        if current.len() > limit {
            blocks.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() || blocks.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Reads a segment artifact.
pub fn read_segments(path: &Path) -> Result<Vec<Segment>, Error> {
    let raw = std::fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Writes a segment artifact atomically.
pub fn write_segments(path: &Path, segments: &[Segment]) -> Result<(), Error> {
    let bytes = serde_json::to_vec(segments)?;
    paths::write_atomic(path, &bytes)?;
    Ok(())
}
