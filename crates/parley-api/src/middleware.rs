use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use parley_types::api::Claims;
use parley_types::models::Identity;

use crate::error::EngineError;
use crate::state::AppState;

/// Validate the bearer token and attach the caller's [`Identity`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, EngineError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(EngineError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(EngineError::Unauthorized)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        EngineError::Unauthorized
    })?;

    req.extensions_mut().insert(identity_from_claims(token_data.claims));
    Ok(next.run(req).await)
}

pub fn identity_from_claims(claims: Claims) -> Identity {
    Identity {
        user_id: claims.sub,
        username: claims.username,
        role: claims.role,
        workspace_id: claims.workspace_id,
        workspace_kind: claims.workspace_kind,
    }
}
