use axum::{
    Extension, Json,
    extract::State,
};
use tracing::info;
use uuid::Uuid;

use parley_types::api::{AcceptCharterRequest, CharterStatus};
use parley_types::models::{Identity, MessagingPolicy};

use crate::error::{ApiResult, DenyReason, EngineError};
use crate::policy::load_policy;
use crate::state::{AppState, run_db};

pub(crate) async fn status_for(
    state: &AppState,
    policy: &MessagingPolicy,
    user_id: Uuid,
) -> ApiResult<CharterStatus> {
    let (org_id, version) = (policy.org_id, policy.charter_version);
    let accepted_at = run_db(state, "charter.status", move |db| {
        db.get_charter_acceptance(org_id, user_id, version)
    })
    .await?;
    Ok(CharterStatus {
        charter_version: version,
        must_accept: accepted_at.is_none(),
        accepted_at,
    })
}

pub(crate) async fn ensure_accepted(
    state: &AppState,
    policy: &MessagingPolicy,
    user_id: Uuid,
) -> ApiResult<()> {
    if status_for(state, policy, user_id).await?.must_accept {
        return Err(EngineError::Forbidden(DenyReason::CharterNotAccepted));
    }
    Ok(())
}

pub async fn charter_status(state: &AppState, identity: &Identity) -> ApiResult<CharterStatus> {
    let policy = load_policy(state, identity.workspace_id).await?;
    status_for(state, &policy, identity.user_id).await
}

/// Accept the current charter. Any other version is a conflict.
pub async fn accept_charter(
    state: &AppState,
    identity: &Identity,
    version: u32,
) -> ApiResult<CharterStatus> {
    let policy = load_policy(state, identity.workspace_id).await?;
    if version != policy.charter_version {
        return Err(EngineError::Conflict("charter_version_mismatch"));
    }

    let (org_id, user_id, now) = (identity.workspace_id, identity.user_id, state.now());
    let accepted_at = run_db(state, "charter.accept", move |db| {
        db.accept_charter(org_id, user_id, version, now)
    })
    .await?;

    info!(org = %org_id, user = %user_id, version, "Charter accepted");
    Ok(CharterStatus {
        charter_version: version,
        must_accept: false,
        accepted_at: Some(accepted_at),
    })
}

pub async fn get_charter(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<CharterStatus>> {
    charter_status(&state, &identity).await.map(Json)
}

pub async fn post_accept(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<AcceptCharterRequest>,
) -> ApiResult<Json<CharterStatus>> {
    accept_charter(&state, &identity, req.charter_version).await.map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::update_policy;
    use crate::test_support::{admin, harness};
    use parley_types::models::{PolicyPatch, Role};

    #[tokio::test]
    async fn accept_flow() {
        let h = harness();
        let student = h.newcomer(Role::Student);

        let status = charter_status(&h.state, &student).await.unwrap();
        assert!(status.must_accept);
        assert_eq!(status.charter_version, 1);

        let err = accept_charter(&h.state, &student, 2).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict("charter_version_mismatch")));

        let first = accept_charter(&h.state, &student, 1).await.unwrap();
        h.clock.advance(chrono::Duration::minutes(5));
        let again = accept_charter(&h.state, &student, 1).await.unwrap();
        assert_eq!(first.accepted_at, again.accepted_at);
        assert!(!charter_status(&h.state, &student).await.unwrap().must_accept);
    }

    #[tokio::test]
    async fn version_bump_requires_new_acceptance() {
        let h = harness();
        let coach = h.member(Role::Coach);
        let policy = load_policy(&h.state, h.org).await.unwrap();
        ensure_accepted(&h.state, &policy, coach.user_id).await.unwrap();

        let policy = update_policy(
            &h.state,
            &admin(h.org),
            PolicyPatch {
                charter_version: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let err = ensure_accepted(&h.state, &policy, coach.user_id).await.unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(DenyReason::CharterNotAccepted)));
    }

    #[tokio::test]
    async fn previous_version_cannot_be_accepted_after_bump() {
        let h = harness();
        let student = h.member(Role::Student);
        update_policy(
            &h.state,
            &admin(h.org),
            PolicyPatch {
                charter_version: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = accept_charter(&h.state, &student, 1).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict("charter_version_mismatch")));
        let status = charter_status(&h.state, &student).await.unwrap();
        assert!(status.must_accept);
        assert_eq!(status.charter_version, 2);

        accept_charter(&h.state, &student, 2).await.unwrap();
        assert!(!charter_status(&h.state, &student).await.unwrap().must_accept);
    }
}
