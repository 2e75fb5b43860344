use std::collections::BTreeMap;
use std::sync::Mutex;

use video_datastore::{MetaStore, VideoMetaEntry};

/// In-memory store that records every failure-flag call.
#[derive(Default)]
pub struct MockMetaStore {
    pub entries: Mutex<BTreeMap<String, VideoMetaEntry>>,
    pub failure_calls: Mutex<Vec<(String, bool, String)>>,
}

impl MetaStore for MockMetaStore {
    fn exists(&self, video_id: &str) -> bool {
        self.entries.lock().unwrap().contains_key(video_id)
    }

    fn read(&self, video_id: &str) -> Option<VideoMetaEntry> {
        self.entries.lock().unwrap().get(video_id).cloned()
    }

    fn read_all(&self) -> BTreeMap<String, VideoMetaEntry> {
        self.entries.lock().unwrap().clone()
    }

    fn create(&self, video_id: &str, entry: VideoMetaEntry) {
        self.entries
            .lock()
            .unwrap()
            .insert(video_id.to_string(), entry);
    }

    fn set_failed(&self, video_id: &str, failed: bool, message: &str) {
        self.failure_calls.lock().unwrap().push((
            video_id.to_string(),
            failed,
            message.to_string(),
        ));

        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(video_id) {
            entry.job_failed = failed;
            entry.last_error = message.to_string();
        }
    }
}
