use std::collections::BTreeMap;

pub mod json;

use crate::VideoMetaEntry;

/// Read/write access to the persistent video-metadata map.
///
/// Mutating calls do not surface persistence errors: the in-memory state is
/// authoritative for the current process and write failures are logged by the
/// implementation.
pub trait MetaStore {
    fn exists(&self, video_id: &str) -> bool;

    fn read(&self, video_id: &str) -> Option<VideoMetaEntry>;

    fn read_all(&self) -> BTreeMap<String, VideoMetaEntry>;

    /// Inserts (or replaces) the entry for `video_id`.
    fn create(&self, video_id: &str, entry: VideoMetaEntry);

    /// Updates the failure flag and last error of an existing entry. A video
    /// without an entry is left untouched.
    fn set_failed(&self, video_id: &str, failed: bool, message: &str);

    /// Marks the last job for `video_id` as successful.
    fn clear_failed(&self, video_id: &str) {
        self.set_failed(video_id, false, "");
    }
}

impl<T: MetaStore + ?Sized> MetaStore for &T {
    fn exists(&self, video_id: &str) -> bool {
        (**self).exists(video_id)
    }

    fn read(&self, video_id: &str) -> Option<VideoMetaEntry> {
        (**self).read(video_id)
    }

    fn read_all(&self) -> BTreeMap<String, VideoMetaEntry> {
        (**self).read_all()
    }

    fn create(&self, video_id: &str, entry: VideoMetaEntry) {
        (**self).create(video_id, entry)
    }

    fn set_failed(&self, video_id: &str, failed: bool, message: &str) {
        (**self).set_failed(video_id, failed, message)
    }
}

/// Errors opening the backing document.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed store document: {0}")]
    Parse(#[from] serde_json::Error),
}
