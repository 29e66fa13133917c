//! Per-actor fixed-window rate limiting.
//!
//! Counters live in storage so every server instance shares them. The
//! limiter is the one check that fails open: if storage is unreachable the
//! request is let through and a warning is logged.

use tracing::warn;
use uuid::Uuid;

use crate::error::{ApiResult, EngineError};
use crate::state::{AppState, try_db};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateAction {
    MessageSend,
    ThreadCreate,
    ContactRequest,
    ContactRespond,
    ReportCreate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window.
    pub max_requests: u32,
    pub window_secs: u64,
}

impl RateAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageSend => "message_send",
            Self::ThreadCreate => "thread_create",
            Self::ContactRequest => "contact_request",
            Self::ContactRespond => "contact_respond",
            Self::ReportCreate => "report_create",
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        let (max_requests, window_secs) = match self {
            Self::MessageSend => (30, 60),
            Self::ThreadCreate => (10, 60),
            Self::ContactRequest => (6, 300),
            Self::ContactRespond => (20, 60),
            Self::ReportCreate => (10, 300),
        };
        RateLimitConfig {
            max_requests,
            window_secs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Seconds until the current window closes. Zero when allowed.
    pub retry_after_seconds: u64,
}

/// Count one attempt of `action` by `actor` against its window.
pub async fn consume(state: &AppState, actor: Uuid, action: RateAction) -> RateDecision {
    let config = action.config();
    let window = config.window_secs as i64;
    let now = state.now().timestamp();
    let window_start = now - now.rem_euclid(window);
    let key = format!("{}:{}", action.as_str(), actor);

    match try_db(&state.db, state.db_timeout, move |db| db.increment_counter(&key, window_start)).await {
        Ok(count) if count > i64::from(config.max_requests) => RateDecision {
            allowed: false,
            retry_after_seconds: (window_start + window - now).max(1) as u64,
        },
        Ok(_) => RateDecision {
            allowed: true,
            retry_after_seconds: 0,
        },
        Err(e) => {
            warn!(action = action.as_str(), %actor, "Rate limiter storage unavailable, allowing request: {:#}", e);
            RateDecision {
                allowed: true,
                retry_after_seconds: 0,
            }
        }
    }
}

pub async fn enforce(state: &AppState, actor: Uuid, action: RateAction) -> ApiResult<()> {
    let decision = consume(state, actor, action).await;
    if decision.allowed {
        Ok(())
    } else {
        Err(EngineError::RateLimited {
            retry_after_seconds: decision.retry_after_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::harness;

    #[tokio::test]
    async fn allows_up_to_the_limit_then_denies() {
        let h = harness();
        let actor = Uuid::new_v4();
        for _ in 0..30 {
            assert!(consume(&h.state, actor, RateAction::MessageSend).await.allowed);
        }
        let denied = consume(&h.state, actor, RateAction::MessageSend).await;
        assert!(!denied.allowed);
        assert!(denied.retry_after_seconds > 0);
        assert!(denied.retry_after_seconds <= 60);
    }

    #[tokio::test]
    async fn window_resets() {
        let h = harness();
        let actor = Uuid::new_v4();
        for _ in 0..6 {
            enforce(&h.state, actor, RateAction::ContactRequest).await.unwrap();
        }
        assert!(matches!(
            enforce(&h.state, actor, RateAction::ContactRequest).await,
            Err(EngineError::RateLimited { .. })
        ));

        h.clock.advance(chrono::Duration::seconds(301));
        enforce(&h.state, actor, RateAction::ContactRequest).await.unwrap();
    }

    #[tokio::test]
    async fn actions_and_actors_are_counted_separately() {
        let h = harness();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        for _ in 0..10 {
            enforce(&h.state, a, RateAction::ThreadCreate).await.unwrap();
        }
        assert!(enforce(&h.state, a, RateAction::ThreadCreate).await.is_err());
        enforce(&h.state, b, RateAction::ThreadCreate).await.unwrap();
        enforce(&h.state, a, RateAction::MessageSend).await.unwrap();
    }

    #[tokio::test]
    async fn storage_failure_fails_open() {
        let h = harness();
        h.state
            .db
            .with_conn(|c| Ok(c.execute_batch("DROP TABLE rate_limit_counters")?))
            .unwrap();
        let actor = Uuid::new_v4();
        for _ in 0..40 {
            assert!(consume(&h.state, actor, RateAction::MessageSend).await.allowed);
        }
    }
}
