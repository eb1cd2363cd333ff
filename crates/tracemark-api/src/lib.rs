pub mod accounts;
pub mod admin;
pub mod applications;
pub mod claims;
pub mod error;
pub mod events;
pub mod middleware;
pub mod publish;
pub mod state;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

pub use state::{AppState, AppStateInner};

/// All HTTP routes. Everything except `/health` requires a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(admin::health));

    let protected_routes = Router::new()
        .route("/content/publish", post(publish::publish))
        .route("/content/{content_id}", delete(publish::delete_content))
        .route("/claims", post(claims::submit).get(claims::list))
        .route("/claims/{claim_id}", get(claims::get))
        .route("/claims/{claim_id}/review", post(claims::review))
        .route("/protection/applications", post(applications::submit))
        .route(
            "/protection/applications/{application_id}/review",
            post(applications::review),
        )
        .route("/accounts/{account_id}", put(accounts::sync))
        .route("/accounts/{account_id}/standing", get(accounts::standing))
        .route("/strikes", post(accounts::record_strike))
        .route("/admin/checkpoint", post(admin::checkpoint))
        .route("/admin/reconciliation", get(admin::reconciliation))
        .route("/events", get(events::all_events))
        .route("/me/notifications", get(events::my_notifications))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
