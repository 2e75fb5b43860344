//! Request handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use super::server::AppState;
use crate::adapters::{ChatMessage, ChatModel};
use crate::chat::{history, SendOutcome};
use crate::job::hub::StreamFrame;
use crate::job::{JobSnapshot, JobStatus};
use crate::paths;

/// POST `/summarize/{video_id}`: enqueue a video.
pub async fn enqueue<M: ChatModel + Send + Sync + 'static>(
    State(state): State<AppState<M>>,
    Path(video_id): Path<String>,
) -> StatusCode {
    if !paths::is_safe_video_id(&video_id) {
        return StatusCode::BAD_REQUEST;
    }

    match state.intake.try_send(video_id) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(mpsc::error::TrySendError::Full(_)) => StatusCode::TOO_MANY_REQUESTS,
        Err(mpsc::error::TrySendError::Closed(_)) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET `/summarize/{video_id}`: current job state.
pub async fn get_job<M: ChatModel + Send + Sync + 'static>(
    State(state): State<AppState<M>>,
    Path(video_id): Path<String>,
) -> Result<Json<JobSnapshot>, StatusCode> {
    state
        .registry
        .get_snapshot(&video_id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub no_summary_reason: Option<&'static str>,
    pub summary: Option<String>,
}

/// GET `/summaries/{video_id}`: summary markdown once finished.
pub async fn get_summary<M: ChatModel + Send + Sync + 'static>(
    State(state): State<AppState<M>>,
    Path(video_id): Path<String>,
) -> Result<Json<SummaryResponse>, StatusCode> {
    if let Some(snapshot) = state.registry.get_snapshot(&video_id) {
        if snapshot.status != JobStatus::Finished {
            return Ok(Json(SummaryResponse {
                no_summary_reason: Some("in_progress"),
                summary: None,
            }));
        }
    }

    match tokio::fs::read_to_string(state.paths.summary(&video_id)).await {
        Ok(summary) => Ok(Json(SummaryResponse {
            no_summary_reason: None,
            summary: Some(summary),
        })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Json(SummaryResponse {
            no_summary_reason: Some("not_found"),
            summary: None,
        })),
        Err(e) => {
            tracing::error!(error = %e, %video_id, "Failed to read summary artifact");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET `/videos`: all stored metadata entries.
pub async fn list_videos<M: ChatModel + Send + Sync + 'static>(
    State(state): State<AppState<M>>,
) -> Response {
    Json(state.store.read_all()).into_response()
}

/// GET `/videos/{video_id}`: one metadata entry.
pub async fn get_video<M: ChatModel + Send + Sync + 'static>(
    State(state): State<AppState<M>>,
    Path(video_id): Path<String>,
) -> Response {
    match state.store.read(&video_id) {
        Some(entry) => Json(entry).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET `/chat/{video_id}`: the persisted transcript, `[]` if none.
pub async fn get_chat_history<M: ChatModel + Send + Sync + 'static>(
    State(state): State<AppState<M>>,
    Path(video_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, StatusCode> {
    history::load(&state.paths, &video_id).map(Json).map_err(|e| {
        tracing::error!(error = %e, %video_id, "Failed to load chat transcript");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

#[derive(Debug, Deserialize)]
pub struct SendChatRequest {
    pub message: String,
}

/// POST `/chat/{video_id}/send`: start a response.
pub async fn send_chat<M: ChatModel + Send + Sync + 'static>(
    State(state): State<AppState<M>>,
    Path(video_id): Path<String>,
    payload: Result<Json<SendChatRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "invalid request").into_response();
    };

    match state.chat.send(&video_id, &request.message) {
        SendOutcome::Accepted => StatusCode::ACCEPTED.into_response(),
        SendOutcome::Busy => (
            StatusCode::CONFLICT,
            "chat is busy processing another message",
        )
            .into_response(),
        SendOutcome::NoRoom => (
            StatusCode::CONFLICT,
            format!("chat for video {video_id:?} not found"),
        )
            .into_response(),
    }
}

/// GET `/summarize/jobs/subscribe`: live job event stream.
pub async fn subscribe_jobs<M: ChatModel + Send + Sync + 'static>(
    State(state): State<AppState<M>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx) = state.registry.subscribe();
    let registry = Arc::clone(&state.registry);
    let guard = SubscriptionGuard::new(move || registry.unsubscribe(id));
    Sse::new(frame_stream(rx, guard))
}

/// GET `/chat/{video_id}/subscribe`: live chat event stream for one room.
pub async fn subscribe_chat<M: ChatModel + Send + Sync + 'static>(
    State(state): State<AppState<M>>,
    Path(video_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx) = state.chat.subscribe(&video_id);
    let chat = state.chat.clone();
    let guard = SubscriptionGuard::new(move || chat.unsubscribe(id));
    Sse::new(frame_stream(rx, guard))
}

/// Runs the unsubscribe callback when the SSE stream is dropped, i.e. when
/// the transport notices the client is gone.
struct SubscriptionGuard {
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionGuard {
    fn new(on_drop: impl FnOnce() + Send + 'static) -> Self {
        SubscriptionGuard {
            on_drop: Some(Box::new(on_drop)),
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(on_drop) = self.on_drop.take() {
            on_drop();
        }
    }
}

fn frame_stream(
    rx: mpsc::UnboundedReceiver<StreamFrame>,
    guard: SubscriptionGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    UnboundedReceiverStream::new(rx).map(move |frame| {
        let _held = &guard;
        Ok(Event::default().event(frame.event).data(frame.data))
    })
}
