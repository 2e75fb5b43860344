use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{MetaStore, StoreError};
use crate::VideoMetaEntry;

/// On-disk document shape: everything under a single `data` key.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    data: BTreeMap<String, VideoMetaEntry>,
}

/// A [`MetaStore`] backed by one JSON file.
///
/// Writers hold the lock exclusively across the mutate-and-rewrite pair; the
/// file is replaced via create-temp + rename in the same directory so readers
/// of the file never observe a partial document.
#[derive(Debug)]
pub struct JsonVideoStore {
    data: RwLock<BTreeMap<String, VideoMetaEntry>>,
    file_path: PathBuf,
}

impl JsonVideoStore {
    /// Opens the store at `path`, seeding an empty document if none exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let file_path = path.into();

        if let Some(dir) = file_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        if !file_path.exists() {
            std::fs::write(&file_path, b"{}")?;
        }

        let raw = std::fs::read(&file_path)?;
        let document: Document = serde_json::from_slice(&raw)?;

        Ok(JsonVideoStore {
            data: RwLock::new(document.data),
            file_path,
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Rewrites the whole document. Errors are logged, not surfaced; the
    /// in-memory map stays authoritative.
    fn persist(&self, data: &BTreeMap<String, VideoMetaEntry>) {
        if let Err(e) = self.try_persist(data) {
            tracing::error!(error = %e, path = %self.file_path.display(), "Failed to persist metadata store");
        }
    }

    fn try_persist(&self, data: &BTreeMap<String, VideoMetaEntry>) -> std::io::Result<()> {
        let dir = self
            .file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let document = Document { data: data.clone() };
        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &document)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.file_path)?;
        Ok(())
    }
}

impl MetaStore for JsonVideoStore {
    fn exists(&self, video_id: &str) -> bool {
        self.data.read().unwrap().contains_key(video_id)
    }

    fn read(&self, video_id: &str) -> Option<VideoMetaEntry> {
        self.data.read().unwrap().get(video_id).cloned()
    }

    fn read_all(&self) -> BTreeMap<String, VideoMetaEntry> {
        self.data.read().unwrap().clone()
    }

    fn create(&self, video_id: &str, entry: VideoMetaEntry) {
        let mut data = self.data.write().unwrap();
        data.insert(video_id.to_string(), entry);
        self.persist(&data);
    }

    fn set_failed(&self, video_id: &str, failed: bool, message: &str) {
        let mut data = self.data.write().unwrap();
        match data.get_mut(video_id) {
            Some(entry) => {
                entry.job_failed = failed;
                entry.last_error = message.to_string();
                self.persist(&data);
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(video_id: &str) -> VideoMetaEntry {
        VideoMetaEntry {
            video_id: video_id.to_string(),
            video_thumbnail_url: "https://i.ytimg.com/vi/x/hq720.jpg".to_string(),
            video_name: "Some video".to_string(),
            creator_name: "Some creator".to_string(),
            length: 1234.0,
            upload_date: "2024-06-01".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn seeds_empty_document_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");

        let store = JsonVideoStore::open(&path).unwrap();
        assert!(store.read_all().is_empty());
        assert!(!store.exists("abc123def45"));

        store.create("abc123def45", entry("abc123def45"));
        assert!(store.exists("abc123def45"));

        // A reopened store sees the persisted entry.
        drop(store);
        let store = JsonVideoStore::open(&path).unwrap();
        assert_eq!(store.read("abc123def45"), Some(entry("abc123def45")));
    }

    #[test]
    fn document_nests_entries_under_data_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");

        let store = JsonVideoStore::open(&path).unwrap();
        store.create("abc123def45", entry("abc123def45"));

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value["data"]["abc123def45"].is_object());
        assert_eq!(value["data"]["abc123def45"]["video_name"], "Some video");
    }

    #[test]
    fn set_failed_updates_existing_entries_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonVideoStore::open(dir.path().join("db.json")).unwrap();

        // No entry yet: a failure report is dropped.
        store.set_failed("abc123def45", true, "boom");
        assert!(!store.exists("abc123def45"));

        store.create("abc123def45", entry("abc123def45"));
        store.set_failed("abc123def45", true, "boom");
        let stored = store.read("abc123def45").unwrap();
        assert!(stored.job_failed);
        assert_eq!(stored.last_error, "boom");

        store.clear_failed("abc123def45");
        let stored = store.read("abc123def45").unwrap();
        assert!(!stored.job_failed);
        assert_eq!(stored.last_error, "");
    }
}
