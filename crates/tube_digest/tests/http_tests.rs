mod mocks;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tokio::sync::mpsc;
use tower::ServiceExt;
use tube_digest::app::{router, AppState};
use tube_digest::chat::{ChatManager, ChatSettings};
use tube_digest::job::registry::JobRegistry;
use tube_digest::job::JobStatus;
use tube_digest::paths::ContentPaths;
use video_datastore::{MetaStore, VideoMetaEntry};

use mocks::chat_model::MockChatModel;
use mocks::meta_store::MockMetaStore;

const VIDEO: &str = "dQw4w9WgXcQ";

struct TestApp {
    _dir: tempfile::TempDir,
    router: Router,
    registry: Arc<JobRegistry>,
    store: Arc<MockMetaStore>,
    _intake_rx: mpsc::Receiver<String>,
}

/// App with a one-slot intake queue and no pipeline draining it.
fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let paths = ContentPaths::new(dir.path());
    paths.ensure_dirs().unwrap();

    let store = Arc::new(MockMetaStore::default());
    let registry = Arc::new(JobRegistry::new(store.clone()));
    let chat = ChatManager::new(
        MockChatModel::new(&["hi"]),
        paths.clone(),
        ChatSettings::default(),
    );
    let (intake_tx, intake_rx) = mpsc::channel(1);

    let state = AppState {
        registry: Arc::clone(&registry),
        chat,
        store: store.clone(),
        intake: intake_tx,
        paths,
    };

    TestApp {
        _dir: dir,
        router: router(state),
        registry,
        store,
        _intake_rx: intake_rx,
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn enqueue_returns_accepted_then_busy_when_the_queue_is_full() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post(format!("/summarize/{VIDEO}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // Nothing drains the one-slot queue, so the next enqueue overflows.
    let response = app
        .router
        .clone()
        .oneshot(
            Request::post(format!("/summarize/{VIDEO}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn enqueue_rejects_ids_that_are_not_path_safe() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/summarize/%2e%2e%2fescape")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_job_is_404_until_the_job_exists() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get(format!("/summarize/{VIDEO}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.registry.create_or_revive(VIDEO);
    let response = app
        .router
        .clone()
        .oneshot(
            Request::get(format!("/summarize/{VIDEO}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["video_id"], VIDEO);
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn summaries_report_why_no_summary_exists() {
    let app = test_app();

    // No job, no artifact.
    let response = app
        .router
        .clone()
        .oneshot(
            Request::get(format!("/summaries/{VIDEO}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["no_summary_reason"], "not_found");
    assert_eq!(body["summary"], serde_json::Value::Null);

    // Live unfinished job.
    let (_, job) = app.registry.create_or_revive(VIDEO);
    let response = app
        .router
        .clone()
        .oneshot(
            Request::get(format!("/summaries/{VIDEO}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["no_summary_reason"], "in_progress");

    // Finished job with an artifact.
    app.registry
        .mutate(&job, |state| state.status = JobStatus::Finished);
    let paths = ContentPaths::new(app._dir.path());
    tube_digest::paths::write_atomic(&paths.summary(VIDEO), b"## The summary").unwrap();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::get(format!("/summaries/{VIDEO}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["summary"], "## The summary");
    assert_eq!(body["no_summary_reason"], serde_json::Value::Null);
}

#[tokio::test]
async fn videos_endpoints_serve_the_metadata_store() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/videos").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({}));

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get(format!("/videos/{VIDEO}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.store.create(
        VIDEO,
        VideoMetaEntry {
            video_id: VIDEO.to_string(),
            video_name: "A video".to_string(),
            ..Default::default()
        },
    );
    let response = app
        .router
        .clone()
        .oneshot(
            Request::get(format!("/videos/{VIDEO}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["video_name"], "A video");
}

#[tokio::test]
async fn chat_history_defaults_to_an_empty_array() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get(format!("/chat/{VIDEO}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));
}

#[tokio::test]
async fn chat_send_maps_outcomes_to_status_codes() {
    let app = test_app();

    // Malformed body.
    let response = app
        .router
        .clone()
        .oneshot(
            Request::post(format!("/chat/{VIDEO}/send"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // No subscribers means no room.
    let response = app
        .router
        .clone()
        .oneshot(
            Request::post(format!("/chat/{VIDEO}/send"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"message": "hello"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
