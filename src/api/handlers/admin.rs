use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::{ApiError, JSend};
use crate::service::SweepReport;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub files: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        files: state.files.catalog().len(),
    })
}

/// Reclaim orphaned blobs and report dangling records.
pub async fn sweep(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<SweepReport>>, ApiError> {
    let report = state.files.sweep_orphans().await?;

    tracing::info!(
        orphans_removed = report.orphans_removed,
        orphans_failed = report.orphans_failed,
        dangling = report.dangling.len(),
        "Sweep complete"
    );

    Ok(JSend::success(report))
}
