use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::delete,
    Router,
};
use crate::middleware::Identity;
use crate::models::AppState;
use crate::types::{AppError, AppResult};
use tracing::info;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/files/{*path}", delete(delete_file))
}

/// DELETE /api/files/{path} - remove one stored object owned by the caller
async fn delete_file(
    State(state): State<AppState>,
    identity: Identity,
    Path(path): Path<String>,
) -> AppResult<StatusCode> {
    let owner = identity.require()?;
    if !owner.owns_path(&path) {
        return Err(AppError::Forbidden(format!("{} is outside the caller's folder", path)));
    }

    info!(owner = %owner, path = %path, "File delete request received");
    state.gateway.remove(&path).await?;
    Ok(StatusCode::NO_CONTENT)
}
