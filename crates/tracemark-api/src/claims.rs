use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracemark_types::api::{
    ReviewClaimRequest, ReviewClaimResponse, SubmitClaimRequest, SubmitClaimResponse,
};
use tracemark_types::models::{Actor, ClaimStatus, CopyrightClaim};
use uuid::Uuid;

use crate::error::{ApiError, blocking};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ClaimQuery {
    #[serde(default = "default_status")]
    pub status: ClaimStatus,
}

fn default_status() -> ClaimStatus {
    ClaimStatus::Pending
}

pub async fn submit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<SubmitClaimRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = state.engine.clone();
    let claim_id = blocking(move || engine.claims.submit(&actor, req)).await?;
    Ok((StatusCode::CREATED, Json(SubmitClaimResponse { claim_id })))
}

pub async fn review(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(claim_id): Path<Uuid>,
    Json(req): Json<ReviewClaimRequest>,
) -> Result<Json<ReviewClaimResponse>, ApiError> {
    let engine = state.engine.clone();
    let response =
        blocking(move || engine.claims.review(&actor, claim_id, req.action, req.reason)).await?;
    Ok(Json(response))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ClaimQuery>,
) -> Result<Json<Vec<CopyrightClaim>>, ApiError> {
    let engine = state.engine.clone();
    let claims = blocking(move || engine.claims.list(&actor, query.status)).await?;
    Ok(Json(claims))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(claim_id): Path<Uuid>,
) -> Result<Json<CopyrightClaim>, ApiError> {
    let engine = state.engine.clone();
    let claim = blocking(move || engine.claims.get(&actor, claim_id)).await?;
    Ok(Json(claim))
}
