use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use parley_types::api::{CreateSuspensionRequest, SuspensionList};
use parley_types::models::{Identity, Suspension};

use crate::access::require_messaging_admin;
use crate::audit;
use crate::error::{ApiResult, EngineError};
use crate::policy::load_policy;
use crate::state::{AppState, run_db};

/// How many unlifted suspensions are inspected per check.
const SUSPENSION_LOOKBACK: u32 = 20;
const MAX_REASON_CHARS: usize = 500;

/// The user's suspension in force right now, if any.
pub async fn active_suspension(
    state: &AppState,
    org_id: Uuid,
    user_id: Uuid,
) -> ApiResult<Option<Suspension>> {
    let recent = run_db(state, "suspension.check", move |db| {
        db.recent_unlifted_suspensions(org_id, user_id, SUSPENSION_LOOKBACK)
    })
    .await?;
    let now = state.now();
    Ok(recent.into_iter().find(|s| s.is_active(now)))
}

pub async fn suspend_user(
    state: &AppState,
    identity: &Identity,
    req: CreateSuspensionRequest,
) -> ApiResult<Suspension> {
    let policy = load_policy(state, identity.workspace_id).await?;
    require_messaging_admin(identity, &policy)?;

    let reason = req.reason.trim().to_string();
    if reason.is_empty() || reason.chars().count() > MAX_REASON_CHARS {
        return Err(EngineError::Validation("invalid_reason"));
    }
    let now = state.now();
    if req.suspended_until.is_some_and(|until| until <= now) {
        return Err(EngineError::Validation("suspended_until_in_past"));
    }

    let (org_id, target) = (identity.workspace_id, req.user_id);
    let role = run_db(state, "suspension.member", move |db| db.get_workspace_role(org_id, target)).await?;
    if role.is_none() {
        return Err(EngineError::NotFound);
    }

    let suspension = Suspension {
        id: Uuid::new_v4(),
        org_id,
        user_id: target,
        reason,
        suspended_until: req.suspended_until,
        created_at: now,
        created_by: identity.user_id,
        lifted_at: None,
        lifted_by: None,
    };
    let row = suspension.clone();
    run_db(state, "suspension.insert", move |db| db.insert_suspension(&row)).await?;

    info!(
        org = %org_id,
        user = %target,
        admin = %identity.user_id,
        until = ?suspension.suspended_until,
        "User suspended from messaging"
    );
    state.audit.record(audit::entry(
        identity,
        "suspension.created",
        None,
        None,
        json!({ "suspension_id": suspension.id, "user_id": target, "suspended_until": suspension.suspended_until }),
        now,
    ));
    Ok(suspension)
}

pub async fn lift_suspension(
    state: &AppState,
    identity: &Identity,
    suspension_id: Uuid,
) -> ApiResult<Suspension> {
    let policy = load_policy(state, identity.workspace_id).await?;
    require_messaging_admin(identity, &policy)?;

    let (org_id, admin_id, now) = (identity.workspace_id, identity.user_id, state.now());
    let lifted = run_db(state, "suspension.lift", move |db| {
        db.lift_suspension(org_id, suspension_id, admin_id, now)
    })
    .await?
    .ok_or(EngineError::NotFound)?;

    info!(org = %org_id, user = %lifted.user_id, admin = %admin_id, "Suspension lifted");
    state.audit.record(audit::entry(
        identity,
        "suspension.lifted",
        None,
        None,
        json!({ "suspension_id": lifted.id, "user_id": lifted.user_id }),
        now,
    ));
    Ok(lifted)
}

pub async fn list_suspensions(
    state: &AppState,
    identity: &Identity,
    user_id: Uuid,
) -> ApiResult<SuspensionList> {
    let policy = load_policy(state, identity.workspace_id).await?;
    require_messaging_admin(identity, &policy)?;

    let org_id = identity.workspace_id;
    let suspensions = run_db(state, "suspension.list", move |db| db.list_suspensions(org_id, user_id)).await?;
    Ok(SuspensionList { suspensions })
}

#[derive(Debug, Deserialize)]
pub struct SuspensionQuery {
    pub user_id: Uuid,
}

pub async fn post_suspension(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateSuspensionRequest>,
) -> ApiResult<(StatusCode, Json<Suspension>)> {
    let suspension = suspend_user(&state, &identity, req).await?;
    Ok((StatusCode::CREATED, Json(suspension)))
}

pub async fn get_suspensions(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<SuspensionQuery>,
) -> ApiResult<Json<SuspensionList>> {
    list_suspensions(&state, &identity, query.user_id).await.map(Json)
}

pub async fn post_lift(
    State(state): State<AppState>,
    Path(suspension_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Suspension>> {
    lift_suspension(&state, &identity, suspension_id).await.map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DenyReason;
    use crate::test_support::harness;
    use chrono::Duration;
    use parley_types::models::Role;

    fn request(user_id: Uuid, until: Option<chrono::DateTime<chrono::Utc>>) -> CreateSuspensionRequest {
        CreateSuspensionRequest {
            user_id,
            reason: "off-platform contact".into(),
            suspended_until: until,
        }
    }

    #[tokio::test]
    async fn timed_suspension_expires() {
        let h = harness();
        let admin = h.member(Role::Admin);
        let coach = h.member(Role::Coach);
        let until = h.state.now() + Duration::hours(1);

        suspend_user(&h.state, &admin, request(coach.user_id, Some(until))).await.unwrap();
        assert!(active_suspension(&h.state, h.org, coach.user_id).await.unwrap().is_some());

        h.clock.advance(Duration::hours(1));
        assert!(active_suspension(&h.state, h.org, coach.user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn open_ended_suspension_holds_until_lifted() {
        let h = harness();
        let admin = h.member(Role::Admin);
        let student = h.member(Role::Student);

        let s = suspend_user(&h.state, &admin, request(student.user_id, None)).await.unwrap();
        h.clock.advance(Duration::days(400));
        assert!(active_suspension(&h.state, h.org, student.user_id).await.unwrap().is_some());

        let lifted = lift_suspension(&h.state, &admin, s.id).await.unwrap();
        assert_eq!(lifted.lifted_by, Some(admin.user_id));
        assert!(active_suspension(&h.state, h.org, student.user_id).await.unwrap().is_none());
        let again = lift_suspension(&h.state, &admin, s.id).await.unwrap();
        assert_eq!(again.lifted_at, lifted.lifted_at);
        assert!(matches!(
            lift_suspension(&h.state, &admin, Uuid::new_v4()).await,
            Err(EngineError::NotFound)
        ));

        h.state.audit.flush().await;
        let actions: Vec<_> = h
            .state
            .db
            .list_audit_entries(h.org, None, 10)
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert!(actions.contains(&"suspension.created".to_string()));
        assert!(actions.contains(&"suspension.lifted".to_string()));
    }

    #[tokio::test]
    async fn validates_requests() {
        let h = harness();
        let admin = h.member(Role::Admin);
        let coach = h.member(Role::Coach);

        let past = h.state.now() - Duration::minutes(1);
        let err = suspend_user(&h.state, &admin, request(coach.user_id, Some(past))).await.unwrap_err();
        assert_eq!(err.reason_code(), "suspended_until_in_past");

        let err = suspend_user(&h.state, &admin, request(Uuid::new_v4(), None)).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound));

        let err = suspend_user(&h.state, &coach, request(admin.user_id, None)).await.unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(DenyReason::NotMessagingAdmin)));
    }
}
