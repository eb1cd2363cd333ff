use axum::{Extension, Json, extract::State};
use serde_json::{Value, json};
use tracemark_types::api::{CheckpointResponse, ReconciliationEntry};
use tracemark_types::models::Actor;

use crate::error::{ApiError, blocking};
use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Run the protection checkpoint now instead of waiting for the interval.
pub async fn checkpoint(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<CheckpointResponse>, ApiError> {
    let engine = state.engine.clone();
    let result = blocking(move || engine.run_checkpoint(&actor)).await?;
    Ok(Json(result))
}

pub async fn reconciliation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<ReconciliationEntry>>, ApiError> {
    let engine = state.engine.clone();
    let entries = blocking(move || engine.reconciliation(&actor)).await?;
    Ok(Json(entries))
}
