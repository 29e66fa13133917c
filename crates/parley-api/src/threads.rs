use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use parley_db::models::NewThread;
use parley_types::api::{CreateThreadRequest, HideThreadRequest, ReadCursorRequest, ThreadSummary};
use parley_types::models::{Identity, MessageThread, Operation, Role, ThreadKind};

use crate::access::{AccessCheck, authorize_thread, gate_actor, role_permits};
use crate::error::{ApiResult, DenyReason, EngineError};
use crate::rate_limit::{self, RateAction};
use crate::state::{AppState, run_db};

const MAX_LISTED_THREADS: u32 = 200;

/// The 1:1 kind for two users, or `None` when the pairing is not allowed.
/// Coach pairs are stored in a fixed order so either side finds the same thread.
pub fn direct_kind(a: Uuid, a_role: Role, b: Uuid, b_role: Role) -> Option<ThreadKind> {
    match (a_role.is_coach_like(), b_role.is_coach_like()) {
        (false, true) => Some(ThreadKind::StudentCoach {
            student_id: a,
            coach_id: b,
        }),
        (true, false) => Some(ThreadKind::StudentCoach {
            student_id: b,
            coach_id: a,
        }),
        (true, true) => Some(ThreadKind::CoachCoach {
            coach_a_id: a.min(b),
            coach_b_id: a.max(b),
        }),
        (false, false) => None,
    }
}

/// Open (or find) a thread. Students reach coaches through contact requests.
pub async fn open_thread(
    state: &AppState,
    identity: &Identity,
    req: CreateThreadRequest,
) -> ApiResult<(MessageThread, bool)> {
    rate_limit::enforce(state, identity.user_id, RateAction::ThreadCreate).await?;
    gate_actor(state, identity, AccessCheck::new(Operation::Write)).await?;

    let org_id = identity.workspace_id;
    let kind = match req {
        CreateThreadRequest::Direct { participant_id } => {
            if participant_id == identity.user_id {
                return Err(EngineError::Validation("self_thread"));
            }
            if !identity.role.is_coach_like() {
                return Err(EngineError::Forbidden(DenyReason::RoleNotPermitted));
            }
            let target_role = run_db(state, "threads.target", move |db| {
                db.get_workspace_role(org_id, participant_id)
            })
            .await?
            .ok_or(EngineError::NotFound)?;
            direct_kind(identity.user_id, identity.role, participant_id, target_role)
                .ok_or(EngineError::Forbidden(DenyReason::RoleNotPermitted))?
        }
        CreateThreadRequest::Group { group_id } | CreateThreadRequest::GroupInfo { group_id } => {
            if !identity.role.is_coach_like() {
                return Err(EngineError::Forbidden(DenyReason::RoleNotPermitted));
            }
            let user_id = identity.user_id;
            let (in_org, member) = run_db(state, "threads.group", move |db| {
                Ok((db.group_in_org(group_id, org_id)?, db.is_group_member(group_id, user_id)?))
            })
            .await?;
            if !in_org {
                return Err(EngineError::NotFound);
            }
            if !member {
                return Err(EngineError::Forbidden(DenyReason::NotParticipant));
            }
            match req {
                CreateThreadRequest::GroupInfo { .. } => ThreadKind::GroupInfo { group_id },
                _ => ThreadKind::Group { group_id },
            }
        }
        CreateThreadRequest::OrgInfo | CreateThreadRequest::OrgCoaches => {
            if identity.role != Role::Admin {
                return Err(EngineError::Forbidden(DenyReason::RoleNotPermitted));
            }
            match req {
                CreateThreadRequest::OrgInfo => ThreadKind::OrgInfo,
                _ => ThreadKind::OrgCoaches,
            }
        }
    };

    let new = NewThread {
        workspace_org_id: org_id,
        kind,
        now: state.now(),
    };
    let (thread, created) = run_db(state, "threads.create", move |db| db.find_or_create_thread(new)).await?;
    if created {
        info!(thread = %thread.id, kind = %thread.kind.tag(), by = %identity.user_id, "Thread created");
    }
    Ok((thread, created))
}

/// Threads the caller can read, newest first.
pub async fn list_threads(
    state: &AppState,
    identity: &Identity,
    include_hidden: bool,
) -> ApiResult<Vec<ThreadSummary>> {
    gate_actor(state, identity, AccessCheck::new(Operation::Read)).await?;

    let (org_id, user_id) = (identity.workspace_id, identity.user_id);
    let rows = run_db(state, "threads.list", move |db| {
        db.list_user_threads(org_id, user_id, MAX_LISTED_THREADS)
    })
    .await?;

    Ok(rows
        .into_iter()
        .filter(|row| role_permits(row.thread.kind.tag(), identity.role, Operation::Read))
        .filter(|row| include_hidden || !row.hidden)
        .map(|row| ThreadSummary {
            thread: row.thread,
            last_read_message_id: row.last_read_message_id,
            hidden: row.hidden,
        })
        .collect())
}

pub async fn mark_read(
    state: &AppState,
    identity: &Identity,
    thread_id: Uuid,
    message_id: i64,
) -> ApiResult<()> {
    authorize_thread(state, identity, thread_id, AccessCheck::new(Operation::Read)).await?;

    let (user_id, now) = (identity.user_id, state.now());
    run_db(state, "threads.read_cursor", move |db| {
        if db.get_message(thread_id, message_id)?.is_none() {
            return Ok(false);
        }
        db.set_read_cursor(thread_id, user_id, message_id, now)?;
        Ok(true)
    })
    .await?
    .then_some(())
    .ok_or(EngineError::NotFound)
}

pub async fn set_hidden(
    state: &AppState,
    identity: &Identity,
    thread_id: Uuid,
    hidden: bool,
) -> ApiResult<()> {
    authorize_thread(state, identity, thread_id, AccessCheck::new(Operation::Hide)).await?;

    let (user_id, now) = (identity.user_id, state.now());
    run_db(state, "threads.hide", move |db| db.set_thread_hidden(thread_id, user_id, hidden, now)).await
}

#[derive(Debug, Deserialize)]
pub struct ThreadListQuery {
    #[serde(default)]
    pub include_hidden: bool,
}

pub async fn get_threads(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ThreadListQuery>,
) -> ApiResult<Json<Vec<ThreadSummary>>> {
    list_threads(&state, &identity, query.include_hidden).await.map(Json)
}

pub async fn post_thread(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateThreadRequest>,
) -> ApiResult<(StatusCode, Json<MessageThread>)> {
    let (thread, created) = open_thread(&state, &identity, req).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(thread)))
}

pub async fn post_read(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ReadCursorRequest>,
) -> ApiResult<StatusCode> {
    mark_read(&state, &identity, thread_id, req.last_read_message_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn post_hide(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<HideThreadRequest>,
) -> ApiResult<StatusCode> {
    set_hidden(&state, &identity, thread_id, req.hidden).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::harness;

    #[test]
    fn direct_kind_pairs() {
        let (s, c1, c2) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(
            direct_kind(c1, Role::Coach, s, Role::Student),
            Some(ThreadKind::StudentCoach { student_id: s, coach_id: c1 })
        );
        assert_eq!(
            direct_kind(c1, Role::Coach, c2, Role::Admin),
            direct_kind(c2, Role::Admin, c1, Role::Coach)
        );
        assert_eq!(direct_kind(s, Role::Student, Uuid::new_v4(), Role::Student), None);
    }

    #[tokio::test]
    async fn coach_opens_direct_thread_once() {
        let h = harness();
        let coach = h.member(Role::Coach);
        let student = h.member(Role::Student);

        let req = || CreateThreadRequest::Direct {
            participant_id: student.user_id,
        };
        let (first, created) = open_thread(&h.state, &coach, req()).await.unwrap();
        assert!(created);
        let (second, created) = open_thread(&h.state, &coach, req()).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);

        let visible = list_threads(&h.state, &student, false).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].thread.id, first.id);
    }

    #[tokio::test]
    async fn students_cannot_open_threads_directly() {
        let h = harness();
        let coach = h.member(Role::Coach);
        let student = h.member(Role::Student);
        let err = open_thread(
            &h.state,
            &student,
            CreateThreadRequest::Direct {
                participant_id: coach.user_id,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(DenyReason::RoleNotPermitted)));
    }

    #[tokio::test]
    async fn org_coaches_hidden_from_students() {
        let h = harness();
        let admin = h.member(Role::Admin);
        let student = h.member(Role::Student);
        open_thread(&h.state, &admin, CreateThreadRequest::OrgCoaches).await.unwrap();
        let (info, _) = open_thread(&h.state, &admin, CreateThreadRequest::OrgInfo).await.unwrap();

        let visible = list_threads(&h.state, &student, false).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].thread.id, info.id);
    }

    #[tokio::test]
    async fn hide_and_read_cursor_are_per_user() {
        let h = harness();
        let coach = h.member(Role::Coach);
        let student = h.member(Role::Student);
        let (thread, _) = open_thread(
            &h.state,
            &coach,
            CreateThreadRequest::Direct {
                participant_id: student.user_id,
            },
        )
        .await
        .unwrap();
        let msg = h
            .state
            .db
            .insert_message(&thread, coach.user_id, "hello", &[], h.state.now())
            .unwrap();

        mark_read(&h.state, &student, thread.id, msg.id).await.unwrap();
        assert!(matches!(
            mark_read(&h.state, &student, thread.id, msg.id + 100).await,
            Err(EngineError::NotFound)
        ));
        set_hidden(&h.state, &student, thread.id, true).await.unwrap();

        assert!(list_threads(&h.state, &student, false).await.unwrap().is_empty());
        let all = list_threads(&h.state, &student, true).await.unwrap();
        assert_eq!(all[0].last_read_message_id, Some(msg.id));
        assert!(all[0].hidden);
        assert!(!list_threads(&h.state, &coach, false).await.unwrap()[0].hidden);
    }
}
