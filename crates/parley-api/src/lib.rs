//! Messaging access control and moderation for coaching workspaces.
//!
//! Every operation is an async function taking the shared [`state::AppState`]
//! and the caller's identity, with a thin axum handler next to it.

pub mod access;
pub mod audit;
pub mod charter;
pub mod clock;
pub mod contacts;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod moderation;
pub mod policy;
pub mod rate_limit;
pub mod retention;
pub mod routes;
pub mod state;
pub mod suspension;
pub mod threads;

#[cfg(test)]
mod test_support;

pub use error::{ApiResult, DenyReason, EngineError};
pub use routes::router;
pub use state::{AppState, AppStateInner};
