//! Router construction and the serve loop.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use video_datastore::MetaStore;

use super::routes;
use crate::adapters::ChatModel;
use crate::chat::ChatManager;
use crate::job::registry::JobRegistry;
use crate::paths::ContentPaths;

/// Shared handler state.
pub struct AppState<M> {
    pub registry: Arc<JobRegistry>,
    pub chat: ChatManager<M>,
    pub store: Arc<dyn MetaStore + Send + Sync>,
    /// Intake queue feeding the pipeline; `try_send` failure maps to a
    /// retryable 429.
    pub intake: mpsc::Sender<String>,
    pub paths: ContentPaths,
}

// Derived Clone would demand M: Clone, which the chat model does not need.
impl<M> Clone for AppState<M> {
    fn clone(&self) -> Self {
        AppState {
            registry: Arc::clone(&self.registry),
            chat: self.chat.clone(),
            store: Arc::clone(&self.store),
            intake: self.intake.clone(),
            paths: self.paths.clone(),
        }
    }
}

/// Builds the API router. CORS is wide open; the service fronts a local
/// web client.
pub fn router<M>(state: AppState<M>) -> Router
where
    M: ChatModel + Send + Sync + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/summarize/jobs/subscribe", get(routes::subscribe_jobs::<M>))
        .route(
            "/summarize/{video_id}",
            post(routes::enqueue::<M>).get(routes::get_job::<M>),
        )
        .route("/summaries/{video_id}", get(routes::get_summary::<M>))
        .route("/videos", get(routes::list_videos::<M>))
        .route("/videos/{video_id}", get(routes::get_video::<M>))
        .route("/chat/{video_id}", get(routes::get_chat_history::<M>))
        .route("/chat/{video_id}/send", post(routes::send_chat::<M>))
        .route("/chat/{video_id}/subscribe", get(routes::subscribe_chat::<M>))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Binds and serves until the process exits.
pub async fn serve<M>(addr: &str, state: AppState<M>) -> anyhow::Result<()>
where
    M: ChatModel + Send + Sync + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Serving HTTP API");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
