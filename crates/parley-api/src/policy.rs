use axum::{
    Extension, Json,
    extract::State,
};
use tracing::info;
use uuid::Uuid;

use parley_types::models::{
    Identity, MAX_RETENTION_DAYS, MessagingPolicy, PolicyPatch, normalize_sensitive_words,
};

use crate::access::require_policy_admin;
use crate::error::{ApiResult, EngineError};
use crate::state::{AppState, run_db};

/// The workspace's policy, or the defaults when none was ever stored.
pub async fn load_policy(state: &AppState, org_id: Uuid) -> ApiResult<MessagingPolicy> {
    let stored = run_db(state, "policy.load", move |db| db.get_policy(org_id)).await?;
    Ok(stored.unwrap_or_else(|| MessagingPolicy::default_for(org_id)))
}

/// The policy as `identity` may see it. Only policy admins get the word list.
pub async fn policy_for(state: &AppState, identity: &Identity) -> ApiResult<MessagingPolicy> {
    let mut policy = load_policy(state, identity.workspace_id).await?;
    if require_policy_admin(identity).is_err() {
        policy.sensitive_words.clear();
    }
    Ok(policy)
}

pub async fn update_policy(
    state: &AppState,
    identity: &Identity,
    mut patch: PolicyPatch,
) -> ApiResult<MessagingPolicy> {
    require_policy_admin(identity)?;

    if let Some(days) = patch.retention_days {
        if !(1..=MAX_RETENTION_DAYS).contains(&days) {
            return Err(EngineError::Validation("retention_days_out_of_range"));
        }
    }
    if let Some(version) = patch.charter_version {
        let current = load_policy(state, identity.workspace_id).await?;
        if version < current.charter_version {
            return Err(EngineError::Validation("charter_version_decrease"));
        }
    }
    patch.sensitive_words = patch.sensitive_words.map(normalize_sensitive_words);

    let org_id = identity.workspace_id;
    let now = state.now();
    let policy = run_db(state, "policy.update", move |db| db.update_policy(org_id, &patch, now)).await?;

    info!(
        org = %org_id,
        admin = %identity.user_id,
        guard_mode = %policy.guard_mode,
        charter_version = policy.charter_version,
        words = policy.sensitive_words.len(),
        "Messaging policy updated"
    );
    Ok(policy)
}

pub async fn get_policy(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<MessagingPolicy>> {
    policy_for(&state, &identity).await.map(Json)
}

pub async fn patch_policy(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(patch): Json<PolicyPatch>,
) -> ApiResult<Json<MessagingPolicy>> {
    update_policy(&state, &identity, patch).await.map(Json)
}
