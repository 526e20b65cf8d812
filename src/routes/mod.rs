//! API Routes
//!
//! - `/api/uploads` - upload batches, task list, events, cancellation
//! - `/api/files` - stored object deletion
//! - `/api/documents` - document catalog
//! - `/api/health` - health checks

pub mod documents;
pub mod files;
pub mod health;
pub mod uploads;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let api_router = Router::new()
        .merge(uploads::router(&state))
        .merge(files::router())
        .merge(documents::router())
        .merge(health::router())
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http());

    apply_cors(api_router, &state.config.server.cors_allowed_origins)
}


#[cfg(test)]
mod tests {
    use super::test_support::{state_with, SECRET};
    use super::*;
    use crate::config::AuthMode;
    use crate::middleware::auth::sign_token;
    use crate::models::{DocumentsResponse, HealthResponse, UploadConfigResponse};
    use crate::storage::MemoryObjectStore;
    use crate::upload::{UploadBatch, UploadEvent, UploadState, UploadTask};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use futures::StreamExt;
    use std::time::Duration;
    use tower::ServiceExt;

    const BOUNDARY: &str = "docfly-test-boundary";

    fn multipart_body(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, data) in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, name
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(user: Option<&str>, files: &[(&str, &[u8])]) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/uploads")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        builder.body(Body::from(multipart_body(files))).unwrap()
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_storage_ready() {
        let (state, _) = state_with(MemoryObjectStore::new(), AuthMode::None).await;
        let response = create_router(state)
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthResponse = json(response).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.storage, "ready");
    }

    #[tokio::test]
    async fn test_upload_config() {
        let (state, _) = state_with(MemoryObjectStore::new(), AuthMode::None).await;
        let response = create_router(state)
            .oneshot(Request::get("/api/uploads/config").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let config: UploadConfigResponse = json(response).await;
        assert_eq!(config.max_files, 10);
        assert_eq!(config.size_limit_bytes, 10_485_760);
        assert_eq!(config.accept, ".doc,.docx,.jpeg,.jpg,.pdf,.png,.txt");
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_batch_end_to_end() {
        let (state, store) = state_with(MemoryObjectStore::new(), AuthMode::None).await;
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(upload_request(Some("u1"), &[("report.pdf", b"%PDF-1.7"), ("notes.txt", b"hello")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let batch: UploadBatch = json(response).await;
        assert_eq!(batch.tasks.len(), 2);
        assert_eq!(batch.dropped, 0);

        tokio::time::sleep(Duration::from_millis(100)).await;

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/uploads")
                    .header("x-user-id", "u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let tasks: Vec<UploadTask> = json(response).await;
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.state == UploadState::Completed));
        let pdf = tasks.iter().find(|t| t.file_name == "report.pdf").unwrap();
        assert!(pdf.object.as_ref().unwrap().path.starts_with("u1/"));
        assert_eq!(store.object_count(), 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(state.uploads.tasks(crate::types::OwnerId::new("u1").as_ref()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlisted_file_type_still_uploaded() {
        let (state, store) = state_with(MemoryObjectStore::new(), AuthMode::None).await;
        let app = create_router(state.clone());

        let response = app
            .oneshot(upload_request(Some("u1"), &[("slides.pptx", b"deck")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let batch: UploadBatch = json(response).await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        let task = state.uploads.task(batch.tasks[0].id).unwrap();
        assert_eq!(task.state, UploadState::Completed);
        assert!(task.object.unwrap().path.ends_with(".pptx"));
        assert_eq!(store.object_count(), 1);
    }

    #[tokio::test]
    async fn test_anonymous_upload_fails_without_retaining_tasks() {
        let (state, store) = state_with(MemoryObjectStore::new(), AuthMode::None).await;
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(upload_request(None, &[("report.pdf", b"%PDF-1.7"), ("notes.txt", b"hi")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let batch: UploadBatch = json(response).await;
        assert_eq!(batch.tasks.len(), 2);
        assert!(batch.tasks.iter().all(|t| t.state == UploadState::Failed));
        assert_eq!(
            batch.tasks[0].error.as_deref(),
            Some("Failed to upload report.pdf: Not authenticated")
        );

        let response = app
            .oneshot(Request::get("/api/uploads").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let tasks: Vec<UploadTask> = json(response).await;
        assert!(tasks.is_empty());
        assert_eq!(store.object_count(), 0);
    }

    /// Reads server-sent events until `stop` returns true for one of them.
    async fn read_events<F>(response: Response, mut stop: F) -> Vec<UploadEvent>
    where
        F: FnMut(&UploadEvent) -> bool,
    {
        let mut body = response.into_body().into_data_stream();
        let mut buffer = String::new();
        let mut events = Vec::new();
        while let Some(chunk) = body.next().await {
            buffer.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            while let Some(end) = buffer.find("\n\n") {
                let frame: String = buffer.drain(..end + 2).collect();
                for line in frame.lines() {
                    if let Some(data) = line.strip_prefix("data:") {
                        let event: UploadEvent = serde_json::from_str(data.trim()).unwrap();
                        let done = stop(&event);
                        events.push(event);
                        if done {
                            return events;
                        }
                    }
                }
            }
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_events_scoped_to_caller() {
        let (state, _) = state_with(MemoryObjectStore::new(), AuthMode::None).await;
        let app = create_router(state.clone());

        let response = app
            .oneshot(
                Request::get("/api/uploads/events")
                    .header("x-user-id", "u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mine = state.uploads.submit(
            crate::types::OwnerId::new("u1"),
            vec![crate::models::FileUpload::new("mine.pdf", b"1".to_vec())],
        );
        let theirs = state.uploads.submit(
            crate::types::OwnerId::new("u2"),
            vec![crate::models::FileUpload::new("theirs.pdf", b"2".to_vec())],
        );
        let mine_id = mine.tasks[0].id;
        let theirs_id = theirs.tasks[0].id;

        let events = tokio::time::timeout(
            Duration::from_secs(30),
            read_events(response, |e| matches!(e, UploadEvent::Removed { task_id } if *task_id == mine_id)),
        )
        .await
        .unwrap();

        assert!(events.iter().all(|e| e.task_id() == mine_id));
        assert!(!events.iter().any(|e| e.task_id() == theirs_id));
        assert!(matches!(&events[0], UploadEvent::Queued { task } if task.file_name == "mine.pdf"));
        assert!(events.iter().any(|e| matches!(e, UploadEvent::Completed { .. })));
        assert!(matches!(events.last(), Some(UploadEvent::Removed { .. })));
    }

    #[tokio::test]
    async fn test_upload_without_files_rejected() {
        let (state, _) = state_with(MemoryObjectStore::new(), AuthMode::None).await;
        let response = create_router(state)
            .oneshot(upload_request(Some("u1"), &[]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_token_rejected() {
        let (state, _) = state_with(MemoryObjectStore::new(), AuthMode::Jwt).await;
        let response = create_router(state)
            .oneshot(
                Request::get("/api/uploads")
                    .header(header::AUTHORIZATION, "Bearer not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cancel_other_owners_task_is_not_found() {
        let (state, _) = state_with(
            MemoryObjectStore::new().with_latency(Duration::from_secs(60)),
            AuthMode::None,
        )
        .await;
        let app = create_router(state.clone());

        let batch = state.uploads.submit(crate::types::OwnerId::new("u1"), vec![
            crate::models::FileUpload::new("a.pdf", b"x".to_vec()),
        ]);
        let id = batch.tasks[0].id;

        let response = app
            .clone()
            .oneshot(
                Request::delete(format!("/api/uploads/{}", id))
                    .header("x-user-id", "u2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(
                Request::delete(format!("/api/uploads/{}", id))
                    .header("x-user-id", "u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let task: UploadTask = json(response).await;
        assert_eq!(task.state, UploadState::Cancelled);
        assert!(state.uploads.task(id).is_none());
    }

    #[tokio::test]
    async fn test_delete_file_requires_ownership() {
        let (state, store) = state_with(MemoryObjectStore::new(), AuthMode::Jwt).await;
        let owner = crate::types::OwnerId::new("u1").unwrap();
        let stored = state
            .gateway
            .store(&crate::models::FileUpload::new("a.pdf", b"x".to_vec()), &owner)
            .await
            .unwrap();
        let app = create_router(state);
        let uri = format!("/api/files/{}", stored.path);

        let response = app
            .clone()
            .oneshot(Request::delete(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(
                Request::delete(&uri)
                    .header(header::AUTHORIZATION, format!("Bearer {}", sign_token("u2", SECRET)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(store.contains("documents", &stored.path));

        let response = app
            .oneshot(
                Request::delete(&uri)
                    .header(header::AUTHORIZATION, format!("Bearer {}", sign_token("u1", SECRET)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(!store.contains("documents", &stored.path));
    }

    #[tokio::test]
    async fn test_documents_preferences() {
        let (state, _) = state_with(MemoryObjectStore::new(), AuthMode::None).await;
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/documents?view=list&q=report")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let listing: DocumentsResponse = json(response).await;
        assert_eq!(listing.view_mode, crate::catalog::ViewMode::Grid);
        assert_eq!(listing.search_query, "");
        assert_eq!(listing.documents.len(), 5);

        let response = app
            .clone()
            .oneshot(
                Request::put("/api/documents/preferences")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"view_mode":"list","search_query":"report"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listing: DocumentsResponse = json(response).await;
        assert_eq!(listing.view_mode, crate::catalog::ViewMode::List);
        assert_eq!(listing.search_query, "report");
        assert_eq!(listing.documents.len(), 5);

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/documents/view/toggle")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body: serde_json::Value = json(response).await;
        assert_eq!(body["view_mode"], "grid");

        let response = app
            .oneshot(Request::get("/api/documents").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let listing: DocumentsResponse = json(response).await;
        assert_eq!(listing.view_mode, crate::catalog::ViewMode::Grid);
        assert_eq!(listing.search_query, "report");
    }

    #[tokio::test]
    async fn test_get_document_by_id() {
        let (state, _) = state_with(MemoryObjectStore::new(), AuthMode::None).await;
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(Request::get("/api/documents/doc-2").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let record: crate::catalog::DocumentRecord = json(response).await;
        assert_eq!(record.title, "Financial Report");

        let response = app
            .oneshot(Request::get("/api/documents/doc-9").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
