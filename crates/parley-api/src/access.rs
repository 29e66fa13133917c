//! Per-request authorization for thread operations.
//!
//! Nothing here is cached. Each check reloads policy, suspensions, charter
//! acceptance and the thread itself, then stops at the first failing step:
//! suspension, charter, thread resolution and freeze, participation and role.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use tracing::debug;
use uuid::Uuid;

use parley_types::api::{AccessDecision, AccessQuery};
use parley_types::models::{
    Identity, MessageThread, MessagingPolicy, Operation, Participation, Role, ThreadKindTag,
    WorkspaceKind,
};

use crate::charter::ensure_accepted;
use crate::error::{ApiResult, DenyReason, EngineError};
use crate::policy::load_policy;
use crate::state::{AppState, run_db};
use crate::suspension::active_suspension;

use Operation::{Hide, Read, Write};

const READ_WRITE_HIDE: &[Operation] = &[Read, Write, Hide];
const READ_HIDE: &[Operation] = &[Read, Hide];
const NOTHING: &[Operation] = &[];

/// Operations each role may perform in each kind of thread.
pub fn allowed_operations(kind: ThreadKindTag, role: Role) -> &'static [Operation] {
    match (kind, role) {
        (ThreadKindTag::StudentCoach | ThreadKindTag::Group, _) => READ_WRITE_HIDE,
        (ThreadKindTag::CoachCoach | ThreadKindTag::OrgCoaches, Role::Student) => NOTHING,
        (ThreadKindTag::CoachCoach | ThreadKindTag::OrgCoaches, _) => READ_WRITE_HIDE,
        (ThreadKindTag::GroupInfo, Role::Student) => READ_HIDE,
        (ThreadKindTag::GroupInfo, _) => READ_WRITE_HIDE,
        (ThreadKindTag::OrgInfo, Role::Admin) => READ_WRITE_HIDE,
        (ThreadKindTag::OrgInfo, _) => READ_HIDE,
    }
}

pub fn role_permits(kind: ThreadKindTag, role: Role, operation: Operation) -> bool {
    allowed_operations(kind, role).contains(&operation)
}

/// Whether `identity` takes part in `thread`. `group_member` is only
/// consulted for group kinds.
pub fn is_participant(thread: &MessageThread, identity: &Identity, group_member: bool) -> bool {
    match thread.kind.participation() {
        Participation::Direct(a, b) => identity.user_id == a || identity.user_id == b,
        Participation::GroupMembers(_) => group_member,
        Participation::WorkspaceMembers => identity.workspace_id == thread.workspace_org_id,
    }
}

/// Admins may change the workspace policy.
pub(crate) fn require_policy_admin(identity: &Identity) -> ApiResult<()> {
    if identity.role == Role::Admin && identity.workspace_kind == WorkspaceKind::Organization {
        Ok(())
    } else {
        Err(EngineError::Forbidden(DenyReason::NotWorkspaceAdmin))
    }
}

/// Moderation surfaces additionally require supervision to be switched on.
pub(crate) fn require_messaging_admin(identity: &Identity, policy: &MessagingPolicy) -> ApiResult<()> {
    let allowed = identity.role == Role::Admin
        && identity.workspace_kind == WorkspaceKind::Organization
        && policy.supervision_enabled;
    if allowed {
        Ok(())
    } else {
        Err(EngineError::Forbidden(DenyReason::NotMessagingAdmin))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessCheck {
    pub operation: Operation,
    /// Skip the charter step. Used for reporting.
    pub charter_exempt: bool,
}

impl AccessCheck {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            charter_exempt: false,
        }
    }
}

pub struct ThreadAccess {
    pub thread: MessageThread,
    pub policy: MessagingPolicy,
}

/// Suspension and charter steps, for operations that may not have a thread yet.
pub(crate) async fn gate_actor(
    state: &AppState,
    identity: &Identity,
    check: AccessCheck,
) -> ApiResult<MessagingPolicy> {
    if check.operation.is_write_class() {
        if let Some(s) = active_suspension(state, identity.workspace_id, identity.user_id).await? {
            debug!(user = %identity.user_id, suspension = %s.id, "Write denied: suspended");
            return Err(EngineError::Forbidden(DenyReason::Suspended));
        }
    }

    let policy = load_policy(state, identity.workspace_id).await?;
    if !check.charter_exempt {
        ensure_accepted(state, &policy, identity.user_id).await?;
    }
    Ok(policy)
}

pub async fn authorize_thread(
    state: &AppState,
    identity: &Identity,
    thread_id: Uuid,
    check: AccessCheck,
) -> ApiResult<ThreadAccess> {
    let policy = gate_actor(state, identity, check).await?;

    let thread = run_db(state, "access.thread", move |db| db.get_thread(thread_id))
        .await?
        .filter(|t| t.workspace_org_id == identity.workspace_id)
        .ok_or(EngineError::NotFound)?;
    if thread.is_frozen() && check.operation.is_write_class() {
        return Err(EngineError::Forbidden(DenyReason::ThreadFrozen));
    }

    let group_member = match thread.kind.participation() {
        Participation::GroupMembers(group_id) => {
            let user_id = identity.user_id;
            run_db(state, "access.group", move |db| db.is_group_member(group_id, user_id)).await?
        }
        Participation::Direct(..) | Participation::WorkspaceMembers => false,
    };
    if !is_participant(&thread, identity, group_member) {
        return Err(EngineError::Forbidden(DenyReason::NotParticipant));
    }
    if !role_permits(thread.kind.tag(), identity.role, check.operation) {
        return Err(EngineError::Forbidden(DenyReason::RoleNotPermitted));
    }

    Ok(ThreadAccess { thread, policy })
}

pub fn decision_of<T>(result: &ApiResult<T>) -> AccessDecision {
    match result {
        Ok(_) => AccessDecision {
            allowed: true,
            reason_code: None,
            http_status_hint: 200,
            retry_after_seconds: None,
        },
        Err(e) => e.decision(),
    }
}

pub async fn get_access(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<AccessQuery>,
) -> Json<AccessDecision> {
    let result = authorize_thread(&state, &identity, thread_id, AccessCheck::new(query.operation)).await;
    Json(decision_of(&result))
}
