use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{debug, info};
use uuid::Uuid;

use parley_db::models::NewThread;
use parley_types::api::{ContactRequestBody, ContactRespondRequest, ContactRespondResponse, ContactSubmitted};
use parley_types::models::{ContactRequest, ContactStatus, Identity, Operation};

use crate::access::{AccessCheck, gate_actor};
use crate::error::{ApiResult, EngineError};
use crate::rate_limit::{self, RateAction};
use crate::state::{AppState, run_db};
use crate::threads::direct_kind;

const MAX_NOTE_CHARS: usize = 500;

fn submitted() -> ContactSubmitted {
    ContactSubmitted {
        status: "submitted".to_string(),
    }
}

/// Ask another workspace member to open a 1:1 thread. The response is the
/// same whether or not the target exists or may be contacted.
pub async fn request_contact(
    state: &AppState,
    identity: &Identity,
    req: ContactRequestBody,
) -> ApiResult<ContactSubmitted> {
    rate_limit::enforce(state, identity.user_id, RateAction::ContactRequest).await?;

    let note = req.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    if note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_CHARS) {
        return Err(EngineError::Validation("note_too_long"));
    }
    if req.target_user_id == identity.user_id {
        return Err(EngineError::Validation("self_contact"));
    }

    gate_actor(state, identity, AccessCheck::new(Operation::Write)).await?;

    let (org_id, from, to) = (identity.workspace_id, identity.user_id, req.target_user_id);
    let (target_role, pending) = run_db(state, "contacts.lookup", move |db| {
        Ok((db.get_workspace_role(org_id, to)?, db.pending_contact_request(org_id, from, to)?))
    })
    .await?;

    let eligible = target_role.is_some_and(|role| direct_kind(from, identity.role, to, role).is_some());
    if !eligible || pending.is_some() {
        debug!(from = %from, eligible, pending = pending.is_some(), "Contact request not recorded");
        return Ok(submitted());
    }

    let request = ContactRequest {
        id: Uuid::new_v4(),
        org_id,
        from_user_id: from,
        to_user_id: to,
        note,
        status: ContactStatus::Pending,
        thread_id: None,
        created_at: state.now(),
        responded_at: None,
    };
    run_db(state, "contacts.insert", move |db| db.insert_contact_request(&request)).await?;
    Ok(submitted())
}

/// Accept or decline a request addressed to the caller. Accepting opens the thread.
pub async fn respond_contact(
    state: &AppState,
    identity: &Identity,
    request_id: Uuid,
    accept: bool,
) -> ApiResult<ContactRespondResponse> {
    rate_limit::enforce(state, identity.user_id, RateAction::ContactRespond).await?;
    gate_actor(state, identity, AccessCheck::new(Operation::Write)).await?;

    let request = run_db(state, "contacts.get", move |db| db.get_contact_request(request_id))
        .await?
        .filter(|r| r.org_id == identity.workspace_id && r.to_user_id == identity.user_id)
        .ok_or(EngineError::NotFound)?;
    if request.status != ContactStatus::Pending {
        return Err(EngineError::Conflict("contact_already_answered"));
    }

    let (org_id, now) = (identity.workspace_id, state.now());
    let thread_id = if accept {
        let from = request.from_user_id;
        let from_role = run_db(state, "contacts.requester", move |db| db.get_workspace_role(org_id, from))
            .await?
            .ok_or(EngineError::NotFound)?;
        let kind = direct_kind(from, from_role, identity.user_id, identity.role)
            .ok_or(EngineError::Conflict("contact_no_longer_allowed"))?;
        let new = NewThread {
            workspace_org_id: org_id,
            kind,
            now,
        };
        let (thread, _) = run_db(state, "contacts.thread", move |db| db.find_or_create_thread(new)).await?;
        Some(thread.id)
    } else {
        None
    };

    let status = if accept { ContactStatus::Accepted } else { ContactStatus::Declined };
    let updated = run_db(state, "contacts.respond", move |db| {
        db.respond_contact_request(request_id, status, thread_id, now)
    })
    .await?;
    if !updated {
        return Err(EngineError::Conflict("contact_already_answered"));
    }

    info!(request = %request_id, status = %status, thread = ?thread_id, "Contact request answered");
    Ok(ContactRespondResponse {
        id: request_id,
        status,
        thread_id,
    })
}

pub async fn post_contact(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ContactRequestBody>,
) -> ApiResult<(StatusCode, Json<ContactSubmitted>)> {
    let submitted = request_contact(&state, &identity, req).await?;
    Ok((StatusCode::ACCEPTED, Json(submitted)))
}

pub async fn post_respond(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ContactRespondRequest>,
) -> ApiResult<Json<ContactRespondResponse>> {
    respond_contact(&state, &identity, request_id, req.accept).await.map(Json)
}
