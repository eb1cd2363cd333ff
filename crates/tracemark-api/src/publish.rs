use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use tracemark_engine::{EngineError, PublishContent, require_service};
use tracemark_types::api::{PublishPayload, PublishRequest, PublishResponse};
use tracemark_types::models::{Actor, ContentPayload, Role};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ApiError, blocking};
use crate::state::AppState;

/// Pre-publish hook. Answers with a status for any authorized body; payloads
/// that cannot be fingerprinted are published unchecked.
pub async fn publish(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<PublishRequest>,
) -> Result<Json<PublishResponse>, ApiError> {
    if actor.role != Role::Service && actor.id != req.owner_id {
        warn!(
            actor_id = %actor.id,
            owner_id = %req.owner_id,
            "Publish attempted for another owner's content"
        );
        return Err(EngineError::Unauthorized("cannot publish for another account".into()).into());
    }

    let decisions = &state.engine.decisions;
    let response = match decode_payload(req.payload) {
        Some(payload) => {
            decisions
                .publish(PublishContent {
                    content_id: req.content_id,
                    owner_id: req.owner_id,
                    payload,
                })
                .await
        }
        None => decisions.publish_unsupported(req.content_id, req.owner_id).await,
    };
    Ok(Json(response))
}

pub async fn delete_content(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(content_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_service(&actor)?;
    let engine = state.engine.clone();
    blocking(move || engine.decisions.content_deleted(content_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// None for kinds the extractor does not handle. Undecodable media becomes an
/// empty payload so extraction skips it.
fn decode_payload(payload: PublishPayload) -> Option<ContentPayload> {
    match payload {
        PublishPayload::Text { body } => Some(ContentPayload::Text(body)),
        PublishPayload::Image { data } => {
            let bytes = B64.decode(data.trim()).unwrap_or_else(|e| {
                debug!("Image data is not valid base64: {}", e);
                Vec::new()
            });
            Some(ContentPayload::Image(bytes))
        }
        PublishPayload::Video {
            source_ref,
            duration_secs,
        } => {
            let duration_ms = match duration_secs {
                Some(secs) if secs.is_finite() && secs >= 0.0 => (secs * 1000.0).round() as u64,
                _ => 0,
            };
            Some(ContentPayload::Video {
                source_ref,
                duration_ms,
            })
        }
        PublishPayload::Unsupported => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_seconds_become_millis() {
        let payload = decode_payload(PublishPayload::Video {
            source_ref: "cdn://a".into(),
            duration_secs: Some(12.3456),
        });
        assert_eq!(
            payload,
            Some(ContentPayload::Video {
                source_ref: "cdn://a".into(),
                duration_ms: 12_346
            })
        );
    }

    #[test]
    fn bad_media_is_kept_as_unfingerprintable() {
        assert_eq!(
            decode_payload(PublishPayload::Image { data: "***".into() }),
            Some(ContentPayload::Image(Vec::new()))
        );
        for duration_secs in [Some(-1.0), Some(f64::NAN), None] {
            assert_eq!(
                decode_payload(PublishPayload::Video {
                    source_ref: "x".into(),
                    duration_secs,
                }),
                Some(ContentPayload::Video {
                    source_ref: "x".into(),
                    duration_ms: 0
                })
            );
        }
        assert_eq!(decode_payload(PublishPayload::Unsupported), None);
    }
}
