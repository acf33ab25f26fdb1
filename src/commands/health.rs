//! `GET /api/health`: probe both backends.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::AppState;
use crate::agent_core::types::HealthStatus;
use crate::agent_core::HealthReport;

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.health().await;
    let status = match report.status {
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Up | HealthStatus::Disabled => StatusCode::OK,
    };
    (status, Json(report))
}
