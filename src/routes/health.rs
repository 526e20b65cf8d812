use axum::{extract::State, routing::get, Json, Router};
use crate::models::{AppState, HealthResponse};
use tracing::warn;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let storage = match state.gateway.bucket_exists().await {
        Ok(true) => "ready",
        Ok(false) => "bucket missing",
        Err(e) => {
            warn!(error = %e, "Storage health check failed");
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        storage: storage.to_string(),
    })
}
