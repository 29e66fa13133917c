//! Best-effort moderation audit trail.
//!
//! Entries are handed to a background writer over a channel and the caller
//! moves on. A failed insert is logged and never rolls back the action that
//! produced it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::{debug, error};
use uuid::Uuid;

use parley_db::Database;
use parley_types::models::{AuditEntry, Identity};

use crate::state::try_db;

/// Entries waiting for the writer. Past this, new entries are dropped.
pub const AUDIT_QUEUE_CAPACITY: usize = 1024;

enum AuditCommand {
    Append(AuditEntry),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct AuditLog {
    tx: mpsc::Sender<AuditCommand>,
}

impl AuditLog {
    pub fn spawn(db: Arc<Database>, timeout: Duration) -> Self {
        Self::spawn_with_capacity(db, timeout, AUDIT_QUEUE_CAPACITY)
    }

    pub fn spawn_with_capacity(db: Arc<Database>, timeout: Duration, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        tokio::spawn(run_writer(db, timeout, rx));
        Self { tx }
    }

    /// Queue `entry` without waiting. A full queue or a stopped writer drops it.
    pub fn record(&self, entry: AuditEntry) {
        let (action, report_id) = (entry.action.clone(), entry.report_id);
        match self.tx.try_send(AuditCommand::Append(entry)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                error!(%action, ?report_id, "Audit queue full, dropping entry")
            }
            Err(TrySendError::Closed(_)) => {
                error!(%action, ?report_id, "Audit writer is gone, dropping entry")
            }
        }
    }

    /// Wait until every entry recorded before this call has been attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(AuditCommand::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }
}

async fn run_writer(db: Arc<Database>, timeout: Duration, mut rx: mpsc::Receiver<AuditCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            AuditCommand::Append(entry) => {
                let action = entry.action.clone();
                let report_id = entry.report_id;
                match try_db(&db, timeout, move |db| db.insert_audit_entry(&entry)).await {
                    Ok(()) => debug!(%action, "Audit entry written"),
                    Err(e) => error!(%action, ?report_id, "Failed to write audit entry: {:#}", e),
                }
            }
            AuditCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

/// Build an entry attributed to `actor` in their active workspace.
pub fn entry(
    actor: &Identity,
    action: &str,
    report_id: Option<Uuid>,
    thread_id: Option<Uuid>,
    metadata: Value,
    now: DateTime<Utc>,
) -> AuditEntry {
    AuditEntry {
        id: Uuid::new_v4(),
        workspace_org_id: actor.workspace_id,
        actor_user_id: actor.user_id,
        report_id,
        thread_id,
        action: action.to_string(),
        metadata,
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{admin, state};

    #[tokio::test]
    async fn recorded_entries_are_written() {
        let (state, org) = state();
        let actor = admin(org);
        state.audit.record(entry(&actor, "report.thread_viewed", None, None, Value::Null, state.now()));
        state.audit.flush().await;

        let rows = state.db.list_audit_entries(org, None, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "report.thread_viewed");
    }

    #[tokio::test]
    async fn write_failures_do_not_stop_the_writer() {
        let (state, org) = state();
        let actor = admin(org);
        state
            .db
            .with_conn(|c| Ok(c.execute_batch("ALTER TABLE moderation_audit RENAME TO audit_gone")?))
            .unwrap();
        state.audit.record(entry(&actor, "report.status_updated", None, None, Value::Null, state.now()));
        state.audit.flush().await;

        state
            .db
            .with_conn(|c| Ok(c.execute_batch("ALTER TABLE audit_gone RENAME TO moderation_audit")?))
            .unwrap();
        state.audit.record(entry(&actor, "report.thread_viewed", None, None, Value::Null, state.now()));
        state.audit.flush().await;

        let rows = state.db.list_audit_entries(org, None, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "report.thread_viewed");
    }

    #[tokio::test]
    async fn full_queue_drops_entries_instead_of_growing() {
        let (state, org) = state();
        let actor = admin(org);
        let log = AuditLog::spawn_with_capacity(state.db.clone(), Duration::from_secs(2), 1);

        // The writer cannot run until this task yields, so only the first entry fits.
        for action in ["report.created", "report.status_updated", "report.thread_viewed"] {
            log.record(entry(&actor, action, None, None, Value::Null, state.now()));
        }
        log.flush().await;

        let rows = state.db.list_audit_entries(org, None, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "report.created");
    }
}
