use serde::{Deserialize, Serialize};

/// Metadata for one video plus the persisted outcome of its last job.
///
/// The wire field names are shared with the job-progress payload, so this
/// record is embedded there verbatim once acquisition extracts it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetaEntry {
    pub video_id: String,
    pub video_thumbnail_url: String,
    pub video_name: String,
    pub creator_name: String,
    /// Video length in seconds.
    pub length: f64,
    /// `YYYY-MM-DD`, empty when the upstream sidecar had none.
    pub upload_date: String,

    #[serde(default)]
    pub job_failed: bool,
    #[serde(default)]
    pub last_error: String,
}
