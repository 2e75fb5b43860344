//! The canonical video-id → job mapping.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use uuid::Uuid;
use video_datastore::MetaStore;

use super::hub::{JobEventHub, StreamFrame};
use super::{JobSnapshot, JobState, JobStatus, SummaryJob};

/// Owns every job record, the only write path to job state, and the
/// broadcast that accompanies each mutation.
///
/// Lock order is registry map → job state → subscriber set; nothing here
/// suspends while holding any of them.
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Arc<SummaryJob>>>,
    hub: JobEventHub,
    store: Arc<dyn MetaStore + Send + Sync>,
}

impl JobRegistry {
    pub fn new(store: Arc<dyn MetaStore + Send + Sync>) -> Self {
        JobRegistry {
            jobs: RwLock::new(HashMap::new()),
            hub: JobEventHub::new(),
            store,
        }
    }

    /// Returns `(true, job)` when a live (non-failed) job already exists for
    /// `video_id`. Otherwise returns `(false, job)` with a fresh `pending`
    /// job (a failed record is revived in place) after clearing the
    /// persisted failure flag and broadcasting a `new` event.
    pub fn create_or_revive(&self, video_id: &str) -> (bool, Arc<SummaryJob>) {
        let mut jobs = self.jobs.write().unwrap();

        if let Some(job) = jobs.get(video_id) {
            let mut state = job.lock();
            if state.status != JobStatus::Failed {
                return (true, Arc::clone(job));
            }

            state.reset();
            self.store.clear_failed(video_id);
            self.hub
                .broadcast(StreamFrame::json("new", &state.snapshot(video_id)));
            drop(state);
            return (false, Arc::clone(job));
        }

        let job = Arc::new(SummaryJob::new(video_id));
        self.store.clear_failed(video_id);
        self.hub.broadcast(StreamFrame::json("new", &job.snapshot()));
        jobs.insert(video_id.to_string(), Arc::clone(&job));
        (false, job)
    }

    pub fn get(&self, video_id: &str) -> Option<Arc<SummaryJob>> {
        self.jobs.read().unwrap().get(video_id).cloned()
    }

    pub fn get_snapshot(&self, video_id: &str) -> Option<JobSnapshot> {
        self.get(video_id).map(|job| job.snapshot())
    }

    pub fn snapshot_all(&self) -> HashMap<String, JobSnapshot> {
        let jobs = self.jobs.read().unwrap();
        jobs.iter()
            .map(|(id, job)| (id.clone(), job.snapshot()))
            .collect()
    }

    /// Applies `mutate` under the job's lock and broadcasts the resulting
    /// snapshot before releasing it, so every subscriber observes updates in
    /// mutation order. The first appearance of video metadata is written
    /// through to the metadata store.
    pub fn mutate(&self, job: &SummaryJob, mutate: impl FnOnce(&mut JobState)) {
        let mut state = job.lock();
        mutate(&mut state);

        if let Some(meta) = &state.progress.video_meta {
            if !self.store.exists(job.video_id()) {
                self.store.create(job.video_id(), meta.clone());
            }
        }

        self.hub
            .broadcast(StreamFrame::json("update", &state.snapshot(job.video_id())));
    }

    /// Persists a stage failure for crash recovery.
    pub fn record_failure(&self, video_id: &str, message: &str) {
        self.store.set_failed(video_id, true, message);
    }

    /// Clears any persisted failure after a successful run.
    pub fn record_success(&self, video_id: &str) {
        self.store.clear_failed(video_id);
    }

    /// Registers a job-stream subscriber whose first frame is an `init`
    /// snapshot of every job.
    pub fn subscribe(&self) -> (Uuid, mpsc::UnboundedReceiver<StreamFrame>) {
        let snapshot = self.snapshot_all();
        self.hub.subscribe(StreamFrame::json("init", &snapshot))
    }

    pub fn unsubscribe(&self, id: Uuid) {
        self.hub.unsubscribe(id);
    }
}
