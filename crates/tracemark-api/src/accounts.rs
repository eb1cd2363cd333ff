use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracemark_engine::require_service;
use tracemark_types::api::{
    AccountStanding, RecordStrikeRequest, RecordStrikeResponse, SyncAccountRequest,
};
use tracemark_types::models::{Account, Actor};
use uuid::Uuid;

use crate::error::{ApiError, blocking};
use crate::state::AppState;

/// Account facts pushed by the auth service.
pub async fn sync(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(account_id): Path<Uuid>,
    Json(req): Json<SyncAccountRequest>,
) -> Result<Json<Account>, ApiError> {
    let engine = state.engine.clone();
    let account = blocking(move || {
        engine.sync_account(
            &actor,
            account_id,
            req.email_verified,
            req.account_type,
            req.created_at,
        )
    })
    .await?;
    Ok(Json(account))
}

pub async fn standing(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountStanding>, ApiError> {
    let engine = state.engine.clone();
    let standing = blocking(move || engine.standing(&actor, account_id)).await?;
    Ok(Json(standing))
}

/// External violation signal (NSFW classifier, spam detector).
pub async fn record_strike(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<RecordStrikeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = state.engine.clone();
    let response: RecordStrikeResponse = blocking(move || {
        require_service(&actor)?;
        engine.decisions.record_external_violation(
            req.account_id,
            req.category,
            &req.idempotency_key,
            &req.reason,
        )
    })
    .await?;
    let status = if response.applied {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)))
}
