use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use crate::catalog::DocumentRecord;
use crate::models::{AppState, DocumentPreferences, DocumentsResponse};
use crate::types::{AppError, AppResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/documents", get(list_documents))
        .route("/api/documents/preferences", put(update_preferences))
        .route("/api/documents/view/toggle", post(toggle_view))
        .route("/api/documents/{id}", get(get_document))
}

/// GET /api/documents - catalog listing with the current preferences
async fn list_documents(State(state): State<AppState>) -> Json<DocumentsResponse> {
    let catalog = state.catalog.read().await;
    Json(DocumentsResponse::from(&*catalog))
}

/// PUT /api/documents/preferences - set view mode and/or search query
async fn update_preferences(
    State(state): State<AppState>,
    Json(prefs): Json<DocumentPreferences>,
) -> Json<DocumentsResponse> {
    let mut catalog = state.catalog.write().await;
    if let Some(view) = prefs.view_mode {
        catalog.set_view_mode(view);
    }
    if let Some(q) = prefs.search_query {
        catalog.set_search_query(q);
    }
    Json(DocumentsResponse::from(&*catalog))
}

/// POST /api/documents/view/toggle - switch between grid and list
async fn toggle_view(State(state): State<AppState>) -> Json<serde_json::Value> {
    let view_mode = state.catalog.write().await.toggle_view_mode();
    Json(serde_json::json!({ "view_mode": view_mode }))
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DocumentRecord>> {
    state
        .catalog
        .read()
        .await
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("document {}", id)))
}
