//! Persistent per-video chat transcripts.

use crate::adapters::ChatMessage;
use crate::error::Error;
use crate::paths::{self, ContentPaths};

/// Loads the stored transcript, or an empty one when none exists.
pub fn load(paths: &ContentPaths, video_id: &str) -> Result<Vec<ChatMessage>, Error> {
    let path = paths.chat(video_id);
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = std::fs::read(&path)?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Appends one user/assistant exchange. The file is replaced atomically, so
/// a crash can never leave a partially written transcript.
pub fn append(
    paths: &ContentPaths,
    video_id: &str,
    user_message: &str,
    assistant_response: &str,
) -> Result<(), Error> {
    let mut transcript = load(paths, video_id)?;
    transcript.push(ChatMessage::user(user_message));
    transcript.push(ChatMessage::assistant(assistant_response));

    let bytes = serde_json::to_vec_pretty(&transcript)?;
    paths::write_atomic(&paths.chat(video_id), &bytes)?;
    Ok(())
}

/// Reads the persisted summary markdown, if the video has one.
pub fn load_summary(paths: &ContentPaths, video_id: &str) -> Result<Option<String>, Error> {
    let path = paths.summary(video_id);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path)?;
    Ok((!content.is_empty()).then_some(content))
}
