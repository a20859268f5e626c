use axum::Json;
use chrono::Utc;
use protocol::HealthResponse;

/// `GET /health` (spec §6) — a liveness probe, not tied to the database or
/// any room state.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_owned(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
