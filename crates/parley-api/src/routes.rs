use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{access, charter, contacts, messages, moderation, policy, suspension, threads};

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route("/messaging/policy", get(policy::get_policy).patch(policy::patch_policy))
        .route("/messaging/charter", get(charter::get_charter))
        .route("/messaging/charter/accept", post(charter::post_accept))
        .route("/threads", get(threads::get_threads).post(threads::post_thread))
        .route("/threads/{thread_id}/access", get(access::get_access))
        .route(
            "/threads/{thread_id}/messages",
            get(messages::get_messages).post(messages::post_message),
        )
        .route("/threads/{thread_id}/read", post(threads::post_read))
        .route("/threads/{thread_id}/hide", post(threads::post_hide))
        .route("/contacts", post(contacts::post_contact))
        .route("/contacts/{request_id}/respond", post(contacts::post_respond))
        .route(
            "/moderation/reports",
            get(moderation::get_reports).post(moderation::post_report),
        )
        .route(
            "/moderation/reports/{report_id}",
            get(moderation::get_report).patch(moderation::post_report_status),
        )
        .route("/moderation/reports/{report_id}/status", post(moderation::post_report_status))
        .route("/moderation/flags", get(moderation::get_flags))
        .route("/moderation/export", get(moderation::get_export))
        .route("/moderation/audit", get(moderation::get_audit))
        .route(
            "/moderation/suspensions",
            get(suspension::get_suspensions).post(suspension::post_suspension),
        )
        .route("/moderation/suspensions/{suspension_id}/lift", post(suspension::post_lift))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
