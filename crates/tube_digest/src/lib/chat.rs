//! Per-video chat rooms with at-most-one in-flight model response.
//!
//! Rooms are created lazily by the first subscriber and removed once the
//! last listener is gone and no response is being produced. The responder
//! task streams tokens into the room under its lock and fans each mutation
//! out to every listener of that video.

pub mod history;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::adapters::{ChatMessage, ChatModel};
use crate::job::hub::StreamFrame;
use crate::paths::ContentPaths;

const CHAT_PERSONA: &str = "You are a smart and chill person answering questions about the video. By default your response should be super short and concise UNLESS EXPLICITLY ASKED to do something that requires a lot more text";

/// Outcome of a send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Accepted,
    /// The room is already producing a response.
    Busy,
    /// No room exists (nobody is subscribed to this video).
    NoRoom,
}

/// Behavior toggles.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// Persist `"Error: …"` replies to the transcript the way successful
    /// replies are persisted.
    pub persist_error_replies: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        ChatSettings {
            persist_error_replies: true,
        }
    }
}

/// Serializable copy of a room, taken under the registry lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub video_id: String,
    pub is_busy: bool,
    #[serde(rename = "request")]
    pub in_progress_request: String,
    #[serde(rename = "response")]
    pub in_progress_response: String,
}

#[derive(Debug, Default)]
struct Room {
    is_busy: bool,
    in_progress_request: String,
    in_progress_response: String,
    listeners: usize,
}

impl Room {
    fn snapshot(&self, video_id: &str) -> RoomSnapshot {
        RoomSnapshot {
            video_id: video_id.to_string(),
            is_busy: self.is_busy,
            in_progress_request: self.in_progress_request.clone(),
            in_progress_response: self.in_progress_response.clone(),
        }
    }
}

struct Client {
    listening_to: String,
    tx: mpsc::UnboundedSender<StreamFrame>,
}

#[derive(Default)]
struct ChatState {
    rooms: HashMap<String, Room>,
    clients: HashMap<Uuid, Client>,
}

impl ChatState {
    fn broadcast(&self, video_id: &str, frame: StreamFrame) {
        for (id, client) in &self.clients {
            if client.listening_to != video_id {
                continue;
            }
            if client.tx.send(frame.clone()).is_err() {
                tracing::debug!(client = %id, "Dropping chat event for stale subscriber");
            }
        }
    }
}

/// Cheap-to-clone handle over the room registry and its responder tasks.
pub struct ChatManager<M> {
    inner: Arc<Inner<M>>,
}

impl<M> Clone for ChatManager<M> {
    fn clone(&self) -> Self {
        ChatManager {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// One lock covers both maps; every critical section is short and never
/// suspends.
struct Inner<M> {
    state: Mutex<ChatState>,
    model: M,
    paths: ContentPaths,
    settings: ChatSettings,
}

impl<M> ChatManager<M>
where
    M: ChatModel + Send + Sync + 'static,
{
    pub fn new(model: M, paths: ContentPaths, settings: ChatSettings) -> Self {
        ChatManager {
            inner: Arc::new(Inner {
                state: Mutex::new(ChatState::default()),
                model,
                paths,
                settings,
            }),
        }
    }

    /// Registers a listener, creating the room lazily; the subscriber's
    /// first frame is an `init` snapshot of the room.
    pub fn subscribe(&self, video_id: &str) -> (Uuid, mpsc::UnboundedReceiver<StreamFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let mut state = self.inner.state.lock().unwrap();
        let room = state.rooms.entry(video_id.to_string()).or_default();
        room.listeners += 1;
        let snapshot = room.snapshot(video_id);

        let _ = tx.send(StreamFrame::json("init", &snapshot));
        state.clients.insert(
            id,
            Client {
                listening_to: video_id.to_string(),
                tx,
            },
        );
        (id, rx)
    }

    pub fn unsubscribe(&self, client_id: Uuid) {
        let mut state = self.inner.state.lock().unwrap();
        let Some(client) = state.clients.remove(&client_id) else {
            return;
        };

        let video_id = client.listening_to;
        if let Some(room) = state.rooms.get_mut(&video_id) {
            room.listeners = room.listeners.saturating_sub(1);
            // Removal is deferred while a response is in flight; the
            // responder re-checks once it completes.
            if room.listeners == 0 && !room.is_busy {
                state.rooms.remove(&video_id);
            }
        }
    }

    /// Snapshot of a live room, if any.
    pub fn snapshot(&self, video_id: &str) -> Option<RoomSnapshot> {
        let state = self.inner.state.lock().unwrap();
        state.rooms.get(video_id).map(|room| room.snapshot(video_id))
    }

    /// Starts a response for `video_id`. The busy test-and-set is atomic
    /// with respect to concurrent sends on the same room.
    pub fn send(&self, video_id: &str, message: &str) -> SendOutcome {
        {
            let mut state = self.inner.state.lock().unwrap();
            let Some(room) = state.rooms.get_mut(video_id) else {
                return SendOutcome::NoRoom;
            };
            if room.is_busy {
                return SendOutcome::Busy;
            }

            room.is_busy = true;
            room.in_progress_request = message.to_string();
            room.in_progress_response.clear();
        }

        self.inner.broadcast_update(video_id);

        let inner = Arc::clone(&self.inner);
        let video_id = video_id.to_string();
        let message = message.to_string();
        tokio::spawn(async move { inner.respond(&video_id, &message).await });

        SendOutcome::Accepted
    }
}

impl<M> Inner<M>
where
    M: ChatModel + Send + Sync + 'static,
{
    async fn respond(&self, video_id: &str, message: &str) {
        let errored = match self.drive_model(video_id, message).await {
            Ok(()) => false,
            Err(error) => {
                // Upstream failures are not fatal: the error text becomes
                // the visible reply and the normal completion path runs.
                {
                    let mut state = self.state.lock().unwrap();
                    if let Some(room) = state.rooms.get_mut(video_id) {
                        room.in_progress_response = format!("Error: {error}");
                    }
                }
                self.broadcast_update(video_id);
                true
            }
        };

        self.broadcast_complete(video_id);

        let final_response = {
            let state = self.state.lock().unwrap();
            state
                .rooms
                .get(video_id)
                .map(|room| room.in_progress_response.clone())
                .unwrap_or_default()
        };

        if !final_response.is_empty() && (!errored || self.settings.persist_error_replies) {
            if let Err(error) = history::append(&self.paths, video_id, message, &final_response) {
                tracing::error!(error = %error, %video_id, "Failed to persist chat transcript");
            }
        }

        {
            let mut state = self.state.lock().unwrap();
            if let Some(room) = state.rooms.get_mut(video_id) {
                room.is_busy = false;
                room.in_progress_request.clear();
                room.in_progress_response.clear();
                if room.listeners == 0 {
                    state.rooms.remove(video_id);
                }
            }
        }
        self.broadcast_update(video_id);
    }

    async fn drive_model(&self, video_id: &str, message: &str) -> anyhow::Result<()> {
        let mut messages = vec![ChatMessage::system(CHAT_PERSONA)];
        if let Some(summary) = history::load_summary(&self.paths, video_id)? {
            messages.push(ChatMessage::system(format!(
                "Here is the summary of the video:\n\n{summary}"
            )));
        }
        messages.extend(history::load(&self.paths, video_id)?);
        messages.push(ChatMessage::user(message));

        self.model
            .stream_reply(&messages, |token| {
                {
                    let mut state = self.state.lock().unwrap();
                    if let Some(room) = state.rooms.get_mut(video_id) {
                        room.in_progress_response.push_str(token);
                    }
                }
                self.broadcast_update(video_id);
            })
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))
    }

    fn broadcast_update(&self, video_id: &str) {
        let state = self.state.lock().unwrap();
        let Some(room) = state.rooms.get(video_id) else {
            return;
        };
        let frame = StreamFrame::json("update", &room.snapshot(video_id));
        state.broadcast(video_id, frame);
    }

    fn broadcast_complete(&self, video_id: &str) {
        let state = self.state.lock().unwrap();
        state.broadcast(
            video_id,
            StreamFrame {
                event: "complete",
                data: "{}".to_string(),
            },
        );
    }
}
