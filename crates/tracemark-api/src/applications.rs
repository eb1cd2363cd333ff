use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracemark_types::api::{
    ReviewApplicationRequest, ReviewApplicationResponse, SubmitApplicationRequest,
    SubmitApplicationResponse,
};
use tracemark_types::models::Actor;
use uuid::Uuid;

use crate::error::{ApiError, blocking};
use crate::state::AppState;

pub async fn submit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<SubmitApplicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let engine = state.engine.clone();
    let application_id = blocking(move || engine.applications.submit(&actor, req)).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitApplicationResponse { application_id }),
    ))
}

pub async fn review(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(application_id): Path<Uuid>,
    Json(req): Json<ReviewApplicationRequest>,
) -> Result<Json<ReviewApplicationResponse>, ApiError> {
    let engine = state.engine.clone();
    let response = blocking(move || {
        engine
            .applications
            .review(&actor, application_id, req.action, req.reason)
    })
    .await?;
    Ok(Json(response))
}
