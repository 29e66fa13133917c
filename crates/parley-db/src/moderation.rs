use anyhow::Result;
use rusqlite::{Row, params};
use uuid::Uuid;

use parley_types::models::{AuditEntry, MessageFlag, MessageReport, ReportStatus};

use crate::Database;
use crate::models::{FreezeChange, PageAfter, ReportTransition};
use crate::queries::{OptionalExt, json_col, tag_col};

const REPORT_COLUMNS: &str = "id, workspace_org_id, thread_id, message_id, reported_by, reason, \
     details, status, freeze_applied, resolved_by, resolved_at, resolution_note, snapshot, \
     snapshot_digest, created_at, updated_at";

impl Database {
    // -- Reports --

    pub fn insert_report(&self, report: &MessageReport) -> Result<()> {
        let snapshot = serde_json::to_string(&report.snapshot)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO message_reports
                    (id, workspace_org_id, thread_id, message_id, reported_by, reason, details, status,
                     freeze_applied, resolved_by, resolved_at, resolution_note, snapshot, snapshot_digest,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    report.id,
                    report.workspace_org_id,
                    report.thread_id,
                    report.message_id,
                    report.reported_by,
                    report.reason,
                    report.details,
                    report.status.as_str(),
                    report.freeze_applied,
                    report.resolved_by,
                    report.resolved_at,
                    report.resolution_note,
                    snapshot,
                    report.snapshot_digest,
                    report.created_at,
                    report.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_report(&self, id: Uuid) -> Result<Option<MessageReport>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {REPORT_COLUMNS} FROM message_reports WHERE id = ?1");
            conn.query_row(&sql, [id], report_from_row).optional()
        })
    }

    /// Newest first, keyset-paginated on `(created_at, id)`.
    pub fn list_reports(
        &self,
        org_id: Uuid,
        status: Option<ReportStatus>,
        before: Option<PageAfter>,
        limit: u32,
    ) -> Result<Vec<MessageReport>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {REPORT_COLUMNS} FROM message_reports
                 WHERE workspace_org_id = ?1
                   AND (?2 IS NULL OR status = ?2)
                   AND (?3 IS NULL OR (created_at, id) < (?3, ?4))
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?5"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![
                        org_id,
                        status.map(|s| s.as_str()),
                        before.map(|p| p.created_at),
                        before.map(|p| p.id),
                        limit,
                    ],
                    report_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Apply a status transition and its thread freeze side effect atomically.
    ///
    /// The update only applies while the report still has `transition.from`.
    /// Returns `None` when another writer changed the status first.
    pub fn apply_report_transition(&self, t: &ReportTransition) -> Result<Option<MessageReport>> {
        let resolved = t.to == ReportStatus::Resolved;
        // Keep the original stamp when a resolved report is resolved again.
        let keep_stamp = resolved && t.from == ReportStatus::Resolved;
        let freeze_applied = t.freeze.as_ref().map(|f| matches!(f, FreezeChange::Freeze { .. }));

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let n = tx.execute(
                "UPDATE message_reports SET
                    status          = ?3,
                    resolved_by     = CASE WHEN ?4 THEN resolved_by WHEN ?5 THEN ?6 ELSE NULL END,
                    resolved_at     = CASE WHEN ?4 THEN resolved_at WHEN ?5 THEN ?7 ELSE NULL END,
                    resolution_note = COALESCE(?8, resolution_note),
                    freeze_applied  = COALESCE(?9, freeze_applied),
                    updated_at      = ?7
                 WHERE id = ?1 AND status = ?2",
                params![
                    t.report_id,
                    t.from.as_str(),
                    t.to.as_str(),
                    keep_stamp,
                    resolved,
                    t.actor,
                    t.now,
                    t.resolution_note,
                    freeze_applied,
                ],
            )?;
            if n == 0 {
                return Ok(None);
            }

            let sql = format!("SELECT {REPORT_COLUMNS} FROM message_reports WHERE id = ?1");
            let report = tx.query_row(&sql, [t.report_id], report_from_row)?;

            match &t.freeze {
                Some(FreezeChange::Freeze { by, reason }) => {
                    tx.execute(
                        "UPDATE message_threads SET frozen_at = ?2, frozen_by = ?3, frozen_reason = ?4
                         WHERE id = ?1",
                        params![report.thread_id, t.now, by, reason],
                    )?;
                }
                Some(FreezeChange::Unfreeze) => {
                    tx.execute(
                        "UPDATE message_threads SET frozen_at = NULL, frozen_by = NULL, frozen_reason = NULL
                         WHERE id = ?1",
                        [report.thread_id],
                    )?;
                }
                None => {}
            }

            tx.commit()?;
            Ok(Some(report))
        })
    }

    // -- Flags --

    /// Newest first.
    pub fn list_flags(&self, org_id: Uuid, limit: u32) -> Result<Vec<MessageFlag>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, org_id, thread_id, message_id, flag_type, matched_value, created_at
                 FROM message_flags WHERE org_id = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![org_id, limit], flag_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Audit --

    pub fn insert_audit_entry(&self, entry: &AuditEntry) -> Result<()> {
        let metadata = serde_json::to_string(&entry.metadata)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO moderation_audit
                    (id, workspace_org_id, actor_user_id, report_id, thread_id, action, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.id,
                    entry.workspace_org_id,
                    entry.actor_user_id,
                    entry.report_id,
                    entry.thread_id,
                    entry.action,
                    metadata,
                    entry.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Newest first, optionally restricted to one report.
    pub fn list_audit_entries(
        &self,
        org_id: Uuid,
        report_id: Option<Uuid>,
        limit: u32,
    ) -> Result<Vec<AuditEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, workspace_org_id, actor_user_id, report_id, thread_id, action, metadata, created_at
                 FROM moderation_audit
                 WHERE workspace_org_id = ?1 AND (?2 IS NULL OR report_id = ?2)
                 ORDER BY created_at DESC
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(params![org_id, report_id, limit], |row| {
                    Ok(AuditEntry {
                        id: row.get(0)?,
                        workspace_org_id: row.get(1)?,
                        actor_user_id: row.get(2)?,
                        report_id: row.get(3)?,
                        thread_id: row.get(4)?,
                        action: row.get(5)?,
                        metadata: json_col(row, 6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn flag_from_row(row: &Row<'_>) -> rusqlite::Result<MessageFlag> {
    Ok(MessageFlag {
        id: row.get(0)?,
        org_id: row.get(1)?,
        thread_id: row.get(2)?,
        message_id: row.get(3)?,
        flag_type: tag_col(row, 4)?,
        matched_value: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<MessageReport> {
    Ok(MessageReport {
        id: row.get(0)?,
        workspace_org_id: row.get(1)?,
        thread_id: row.get(2)?,
        message_id: row.get(3)?,
        reported_by: row.get(4)?,
        reason: row.get(5)?,
        details: row.get(6)?,
        status: tag_col(row, 7)?,
        freeze_applied: row.get(8)?,
        resolved_by: row.get(9)?,
        resolved_at: row.get(10)?,
        resolution_note: row.get(11)?,
        snapshot: json_col(row, 12)?,
        snapshot_digest: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}
