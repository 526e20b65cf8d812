//! Upload endpoints
//!
//! - `GET /api/uploads/config` - limits the file picker should apply
//! - `POST /api/uploads` - multipart batch, one task per file part
//! - `GET /api/uploads` - the caller's visible tasks
//! - `GET /api/uploads/events` - server-sent task events
//! - `DELETE /api/uploads/{id}` - cancel or dismiss a task

use std::collections::HashSet;
use std::convert::Infallible;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get},
    Json, Router,
};
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};
use uuid::Uuid;

use crate::middleware::Identity;
use crate::models::{AppState, FileUpload, UploadConfigResponse};
use crate::types::{AppError, AppResult};
use crate::upload::{UploadBatch, UploadEvent, UploadTask};

// Room for multipart framing on top of the file bytes.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(state: &AppState) -> Router<AppState> {
    let settings = state.uploads.settings();
    let body_limit = (settings.size_limit_bytes as usize)
        .saturating_mul(settings.max_files.max(1))
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/api/uploads/config", get(upload_config))
        .route(
            "/api/uploads",
            get(list_uploads)
                .post(submit_uploads)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/uploads/events", get(upload_events))
        .route("/api/uploads/{id}", delete(cancel_upload))
}

async fn upload_config(State(state): State<AppState>) -> Json<UploadConfigResponse> {
    let settings = state.uploads.settings();
    Json(UploadConfigResponse {
        max_files: settings.max_files,
        size_limit_bytes: settings.size_limit_bytes,
        accept: settings.accept_attribute(),
    })
}

async fn submit_uploads(
    State(state): State<AppState>,
    identity: Identity,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadBatch>)> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

        if !state.uploads.settings().accepts(&filename) {
            debug!(file = %filename, "File type outside the accept list, uploading anyway");
        }
        let mut file = FileUpload::new(filename, data);
        if let Some(content_type) = content_type {
            file = file.with_content_type(content_type);
        }
        files.push(file);
    }

    if files.is_empty() {
        return Err(AppError::InvalidRequest("no files in request".to_string()));
    }

    info!(files = files.len(), "Upload request received");
    let batch = state.uploads.submit(identity.0, files);
    Ok((StatusCode::ACCEPTED, Json(batch)))
}

async fn list_uploads(State(state): State<AppState>, identity: Identity) -> Json<Vec<UploadTask>> {
    Json(state.uploads.tasks(identity.owner()))
}

async fn cancel_upload(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UploadTask>> {
    // Other callers' tasks look the same as missing ones.
    match state.uploads.task(id) {
        Some(task) if task.owner_id.as_ref() == identity.owner() => {}
        _ => return Err(AppError::NotFound(format!("upload task {}", id))),
    }
    Ok(Json(state.uploads.cancel(id)?))
}

async fn upload_events(
    State(state): State<AppState>,
    identity: Identity,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let owner = identity.0;
    let receiver = state.uploads.subscribe();
    let known: HashSet<Uuid> = state
        .uploads
        .tasks(owner.as_ref())
        .into_iter()
        .map(|t| t.id)
        .collect();

    let events = stream::unfold((receiver, known), move |(mut receiver, mut known)| {
        let owner = owner.clone();
        async move {
            loop {
                let event = match receiver.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Upload event subscriber lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => return None,
                };

                match &event {
                    UploadEvent::Queued { task } if task.owner_id == owner => {
                        known.insert(task.id);
                    }
                    UploadEvent::Removed { task_id } if known.remove(task_id) => {}
                    other if known.contains(&other.task_id()) => {}
                    _ => continue,
                }

                let data = serde_json::to_string(&event).unwrap_or_default();
                return Some((Ok(Event::default().data(data)), (receiver, known)));
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
