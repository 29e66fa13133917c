/// Write-side parameter types. Read paths map rows straight into the
/// parley-types domain models.
use chrono::{DateTime, Utc};
use uuid::Uuid;

use parley_types::models::{ReportStatus, ThreadKind};

/// Change to a thread's freeze state applied alongside a report transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FreezeChange {
    Freeze { by: Uuid, reason: String },
    Unfreeze,
}

/// Compare-and-set status update for a report.
#[derive(Debug, Clone)]
pub struct ReportTransition {
    pub report_id: Uuid,
    /// Status the row must still have for the update to apply.
    pub from: ReportStatus,
    pub to: ReportStatus,
    pub actor: Uuid,
    pub resolution_note: Option<String>,
    pub freeze: Option<FreezeChange>,
    pub now: DateTime<Utc>,
}

/// A thread to find or create.
#[derive(Debug, Clone, Copy)]
pub struct NewThread {
    pub workspace_org_id: Uuid,
    pub kind: ThreadKind,
    pub now: DateTime<Utc>,
}

/// Opaque-cursor position for keyset pagination on `(created_at, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageAfter {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

pub struct UserThreadRow {
    pub thread: parley_types::models::MessageThread,
    pub last_read_message_id: Option<i64>,
    pub hidden: bool,
}
