use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::error;

use parley_db::Database;

use crate::audit::AuditLog;
use crate::clock::Clock;
use crate::error::EngineError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub clock: Arc<dyn Clock>,
    pub audit: AuditLog,
    /// Upper bound for every storage call.
    pub db_timeout: Duration,
}

impl AppStateInner {
    /// Build the shared state and start the audit writer. Needs a Tokio runtime.
    pub fn new(
        db: Database,
        jwt_secret: impl Into<String>,
        clock: Arc<dyn Clock>,
        db_timeout: Duration,
    ) -> AppState {
        let db = Arc::new(db);
        let audit = AuditLog::spawn(db.clone(), db_timeout);
        Arc::new(Self {
            db,
            jwt_secret: jwt_secret.into(),
            clock,
            audit,
            db_timeout,
        })
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Run a blocking storage call off the async runtime, bounded by `timeout`.
pub(crate) async fn try_db<F, T>(db: &Arc<Database>, timeout: Duration, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    let task = tokio::task::spawn_blocking(move || f(&db));
    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => joined.map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))?,
        Err(_) => Err(anyhow::anyhow!("storage call timed out after {:?}", timeout)),
    }
}

/// Like [`try_db`], failing closed: any storage problem becomes `DependencyUnavailable`.
pub(crate) async fn run_db<F, T>(state: &AppState, op: &'static str, f: F) -> Result<T, EngineError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    try_db(&state.db, state.db_timeout, f).await.map_err(|e| {
        error!(op, "Storage call failed: {:#}", e);
        EngineError::DependencyUnavailable
    })
}
