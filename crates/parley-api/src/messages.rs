use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use parley_guard::{detect_flags, should_block};
use parley_types::api::{MessagePage, SendMessageRequest, SendMessageResponse};
use parley_types::models::{Identity, Operation};

use crate::access::{AccessCheck, authorize_thread};
use crate::error::{ApiResult, EngineError};
use crate::rate_limit::{self, RateAction};
use crate::state::{AppState, run_db};

pub const MAX_BODY_CHARS: usize = 2000;
const MAX_PAGE: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Message id of the oldest message already seen; returns older ones.
    pub before: Option<i64>,
}

fn default_limit() -> u32 {
    50
}

pub async fn send_message(
    state: &AppState,
    identity: &Identity,
    thread_id: Uuid,
    body: String,
) -> ApiResult<SendMessageResponse> {
    rate_limit::enforce(state, identity.user_id, RateAction::MessageSend).await?;

    if body.trim().is_empty() {
        return Err(EngineError::Validation("body_empty"));
    }
    if body.chars().count() > MAX_BODY_CHARS {
        return Err(EngineError::Validation("body_too_long"));
    }

    let access = authorize_thread(state, identity, thread_id, AccessCheck::new(Operation::Write)).await?;

    let flags = detect_flags(&body, &access.policy.sensitive_words);
    let minor_thread = access.thread.kind.involves_students();
    if should_block(access.policy.guard_mode, minor_thread, &flags) {
        warn!(
            thread = %thread_id,
            author = %identity.user_id,
            flags = flags.len(),
            "Message blocked by content guard"
        );
        return Err(EngineError::ContentBlocked { flags });
    }

    let (thread, author, now) = (access.thread, identity.user_id, state.now());
    let stored_flags = flags.clone();
    let message = run_db(state, "messages.insert", move |db| {
        db.insert_message(&thread, author, &body, &stored_flags, now)
    })
    .await?;

    if !flags.is_empty() {
        debug!(message = message.id, thread = %thread_id, flags = flags.len(), "Message flagged");
    }
    Ok(SendMessageResponse { message, flags })
}

pub async fn message_page(
    state: &AppState,
    identity: &Identity,
    thread_id: Uuid,
    query: MessageQuery,
) -> ApiResult<MessagePage> {
    authorize_thread(state, identity, thread_id, AccessCheck::new(Operation::Read)).await?;

    let limit = query.limit.clamp(1, MAX_PAGE);
    let before = query.before;
    let messages = run_db(state, "messages.page", move |db| db.get_messages(thread_id, before, limit)).await?;
    let next_before = if messages.len() == limit as usize {
        messages.last().map(|m| m.id)
    } else {
        None
    };
    Ok(MessagePage { messages, next_before })
}

pub async fn post_message(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<SendMessageResponse>)> {
    let sent = send_message(&state, &identity, thread_id, req.body).await?;
    Ok((StatusCode::CREATED, Json(sent)))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<MessageQuery>,
) -> ApiResult<Json<MessagePage>> {
    message_page(&state, &identity, thread_id, query).await.map(Json)
}
