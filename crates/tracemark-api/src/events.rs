use std::convert::Infallible;

use axum::{
    Extension,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracemark_engine::{Dispatcher, require_service};
use tracemark_types::events::EngineEvent;
use tracemark_types::models::Actor;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Every relayed event, for trusted services.
pub async fn all_events(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    require_service(&actor)?;
    let mut rx = state.dispatcher.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(sse) = to_sse(&event) {
                        yield Ok(sse);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// The caller's own notifications.
pub async fn my_notifications(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (stream_id, mut rx) = state.dispatcher.register_user_channel(actor.id).await;
    let guard = StreamGuard {
        dispatcher: state.dispatcher.clone(),
        user_id: actor.id,
        stream_id,
    };
    debug!("Notification stream {} opened for {}", stream_id, actor.id);

    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = rx.recv().await {
            if let Some(sse) = to_sse(&event) {
                yield Ok(sse);
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse(event: &EngineEvent) -> Option<Event> {
    let name = match event {
        EngineEvent::Notification(_) => "notification",
        EngineEvent::DecisionRecorded(_) => "decision",
    };
    match Event::default().event(name).json_data(event) {
        Ok(sse) => Some(sse),
        Err(e) => {
            warn!("Failed to encode event for SSE: {}", e);
            None
        }
    }
}

/// Unregisters a user stream when the client goes away.
struct StreamGuard {
    dispatcher: Dispatcher,
    user_id: Uuid,
    stream_id: Uuid,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        let dispatcher = self.dispatcher.clone();
        let (user_id, stream_id) = (self.user_id, self.stream_id);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                dispatcher.unregister_user_channel(user_id, stream_id).await;
                debug!("Notification stream {} closed", stream_id);
            });
        }
    }
}
