use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use parley_types::api::AccessDecision;
use parley_types::models::{Flag, FlagType};

/// Why an identified caller was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Suspended,
    CharterNotAccepted,
    ThreadFrozen,
    NotParticipant,
    RoleNotPermitted,
    NotWorkspaceAdmin,
    NotMessagingAdmin,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Suspended => "suspended",
            Self::CharterNotAccepted => "charter_not_accepted",
            Self::ThreadFrozen => "thread_frozen",
            Self::NotParticipant => "not_participant",
            Self::RoleNotPermitted => "role_not_permitted",
            Self::NotWorkspaceAdmin => "not_workspace_admin",
            Self::NotMessagingAdmin => "not_messaging_admin",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Malformed input; the string is the reason code.
    #[error("invalid request: {0}")]
    Validation(&'static str),

    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error("forbidden: {}", .0.code())]
    Forbidden(DenyReason),

    /// Absent, or belongs to another workspace.
    #[error("not found")]
    NotFound,

    /// Stale input or a lost race; the string is the reason code.
    #[error("conflict: {0}")]
    Conflict(&'static str),

    #[error("rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("message blocked by content guard ({} flags)", .flags.len())]
    ContentBlocked { flags: Vec<Flag> },

    /// Storage failed or timed out. Safety checks fail closed on this.
    #[error("dependency unavailable")]
    DependencyUnavailable,
}

pub type ApiResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Validation(code) | Self::Conflict(code) => *code,
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(reason) => reason.code(),
            Self::NotFound => "not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::ContentBlocked { .. } => "content_blocked",
            Self::DependencyUnavailable => "dependency_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::ContentBlocked { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::DependencyUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn decision(&self) -> AccessDecision {
        AccessDecision {
            allowed: false,
            reason_code: Some(self.reason_code().to_string()),
            http_status_hint: self.status().as_u16(),
            retry_after_seconds: match self {
                Self::RateLimited { retry_after_seconds } => Some(*retry_after_seconds),
                _ => None,
            },
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    #[serde(flatten)]
    decision: AccessDecision,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    flag_types: Vec<FlagType>,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status();
        let flag_types = match &self {
            Self::ContentBlocked { flags } => flags.iter().map(|f| f.flag_type).collect(),
            _ => Vec::new(),
        };
        let body = ErrorBody {
            decision: self.decision(),
            flag_types,
        };

        let mut response = (status, Json(body)).into_response();
        if let Self::RateLimited { retry_after_seconds } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
