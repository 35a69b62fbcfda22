use axum::{extract::State, Json};
use omnissm_manager::ReconcileSummary;
use std::sync::Arc;

use crate::{error::ApiError, state::AppState};

/// POST /reconcile
///
/// Runs one reconciliation pass. Deployments without an external timer
/// can drive this endpoint from cron.
pub async fn trigger(State(state): State<Arc<AppState>>) -> Result<Json<ReconcileSummary>, ApiError> {
    let summary = state.reconciler.run().await?;
    Ok(Json(summary))
}
