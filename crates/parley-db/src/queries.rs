use std::str::FromStr;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use parley_types::models::{
    ContactRequest, ContactStatus, Flag, Message, MessageThread, MessagingPolicy, PolicyPatch,
    Role, Suspension, ThreadKind, ThreadKindTag,
};

use crate::Database;
use crate::models::{NewThread, PageAfter, UserThreadRow};

pub(crate) const THREAD_COLUMNS: &str = "id, kind, workspace_org_id, participant_a, participant_b, \
     group_id, frozen_at, frozen_by, frozen_reason, created_at";

pub(crate) const MESSAGE_COLUMNS: &str = "id, thread_id, author_id, body, created_at, redacted_at";

const SUSPENSION_COLUMNS: &str = "id, org_id, user_id, reason, suspended_until, created_at, \
     created_by, lifted_at, lifted_by";

const CONTACT_COLUMNS: &str = "id, org_id, from_user_id, to_user_id, note, status, thread_id, \
     created_at, responded_at";

impl Database {
    // -- Policies --

    pub fn get_policy(&self, org_id: Uuid) -> Result<Option<MessagingPolicy>> {
        self.with_conn(|conn| query_policy(conn, org_id))
    }

    /// Create the default row if missing, then apply each provided field
    /// independently. `sensitive_words` must already be normalized.
    pub fn update_policy(
        &self,
        org_id: Uuid,
        patch: &PolicyPatch,
        now: DateTime<Utc>,
    ) -> Result<MessagingPolicy> {
        let words = patch
            .sensitive_words
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let defaults = MessagingPolicy::default_for(org_id);
            tx.execute(
                "INSERT OR IGNORE INTO messaging_policies
                    (org_id, guard_mode, sensitive_words, retention_days, charter_version, supervision_enabled, updated_at)
                 VALUES (?1, ?2, '[]', ?3, ?4, ?5, ?6)",
                params![
                    org_id,
                    defaults.guard_mode.as_str(),
                    defaults.retention_days,
                    defaults.charter_version,
                    defaults.supervision_enabled,
                    now,
                ],
            )?;
            tx.execute(
                "UPDATE messaging_policies SET
                    guard_mode          = COALESCE(?2, guard_mode),
                    sensitive_words     = COALESCE(?3, sensitive_words),
                    retention_days      = COALESCE(?4, retention_days),
                    charter_version     = MAX(charter_version, COALESCE(?5, charter_version)),
                    supervision_enabled = COALESCE(?6, supervision_enabled),
                    updated_at          = ?7
                 WHERE org_id = ?1",
                params![
                    org_id,
                    patch.guard_mode.map(|m| m.as_str()),
                    words,
                    patch.retention_days,
                    patch.charter_version,
                    patch.supervision_enabled,
                    now,
                ],
            )?;
            let policy = query_policy(&tx, org_id)?
                .ok_or_else(|| anyhow!("Policy row vanished for org {}", org_id))?;
            tx.commit()?;
            Ok(policy)
        })
    }

    /// Every org with at least one thread, with its retention window in days.
    pub fn retention_windows(&self) -> Result<Vec<(Uuid, u32)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT t.workspace_org_id, p.retention_days
                 FROM message_threads t
                 LEFT JOIN messaging_policies p ON p.org_id = t.workspace_org_id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, Uuid>(0)?,
                        row.get::<_, Option<u32>>(1)?
                            .unwrap_or(parley_types::models::DEFAULT_RETENTION_DAYS),
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Charter --

    pub fn get_charter_acceptance(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        charter_version: u32,
    ) -> Result<Option<DateTime<Utc>>> {
        self.with_conn(|conn| query_acceptance(conn, org_id, user_id, charter_version))
    }

    /// Idempotent: a repeated accept keeps the first `accepted_at`.
    pub fn accept_charter(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        charter_version: u32,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO charter_acceptances (org_id, user_id, charter_version, accepted_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(org_id, user_id, charter_version) DO NOTHING",
                params![org_id, user_id, charter_version, now],
            )?;
            query_acceptance(conn, org_id, user_id, charter_version)?
                .ok_or_else(|| anyhow!("Charter acceptance missing after insert"))
        })
    }

    // -- Suspensions --

    /// Most recent non-lifted suspensions, newest first.
    pub fn recent_unlifted_suspensions(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<Suspension>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SUSPENSION_COLUMNS} FROM messaging_suspensions
                 WHERE org_id = ?1 AND user_id = ?2 AND lifted_at IS NULL
                 ORDER BY created_at DESC
                 LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![org_id, user_id, limit], suspension_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_suspensions(&self, org_id: Uuid, user_id: Uuid) -> Result<Vec<Suspension>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SUSPENSION_COLUMNS} FROM messaging_suspensions
                 WHERE org_id = ?1 AND user_id = ?2
                 ORDER BY created_at DESC
                 LIMIT 100"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![org_id, user_id], suspension_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn insert_suspension(&self, s: &Suspension) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messaging_suspensions
                    (id, org_id, user_id, reason, suspended_until, created_at, created_by, lifted_at, lifted_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    s.id,
                    s.org_id,
                    s.user_id,
                    s.reason,
                    s.suspended_until,
                    s.created_at,
                    s.created_by,
                    s.lifted_at,
                    s.lifted_by,
                ],
            )?;
            Ok(())
        })
    }

    /// Stamp `lifted_at` once. Returns the row, or `None` if it is not in this org.
    pub fn lift_suspension(
        &self,
        org_id: Uuid,
        id: Uuid,
        lifted_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Suspension>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messaging_suspensions SET lifted_at = ?3, lifted_by = ?4
                 WHERE id = ?1 AND org_id = ?2 AND lifted_at IS NULL",
                params![id, org_id, now, lifted_by],
            )?;
            let sql = format!(
                "SELECT {SUSPENSION_COLUMNS} FROM messaging_suspensions WHERE id = ?1 AND org_id = ?2"
            );
            conn.query_row(&sql, params![id, org_id], suspension_from_row).optional()
        })
    }

    // -- Membership --

    pub fn add_workspace_member(&self, org_id: Uuid, user_id: Uuid, role: Role) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO workspace_members (org_id, user_id, role) VALUES (?1, ?2, ?3)
                 ON CONFLICT(org_id, user_id) DO UPDATE SET role = excluded.role",
                params![org_id, user_id, role.as_str()],
            )?;
            Ok(())
        })
    }

    pub fn get_workspace_role(&self, org_id: Uuid, user_id: Uuid) -> Result<Option<Role>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT role FROM workspace_members WHERE org_id = ?1 AND user_id = ?2",
                params![org_id, user_id],
                |row| tag_col::<Role>(row, 0),
            )
            .optional()
        })
    }

    pub fn add_group_member(&self, group_id: Uuid, org_id: Uuid, user_id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO group_members (group_id, org_id, user_id) VALUES (?1, ?2, ?3)",
                params![group_id, org_id, user_id],
            )?;
            Ok(())
        })
    }

    pub fn is_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM group_members WHERE group_id = ?1 AND user_id = ?2",
                    params![group_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn group_in_org(&self, group_id: Uuid, org_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM group_members WHERE group_id = ?1 AND org_id = ?2 LIMIT 1",
                    params![group_id, org_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    // -- Threads --

    /// Return the thread for this kind in this workspace, creating it on first contact.
    /// The bool is true when the thread was created by this call.
    pub fn find_or_create_thread(&self, new: NewThread) -> Result<(MessageThread, bool)> {
        let (tag, a, b, group) = new.kind.to_columns();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let sql = format!(
                "SELECT {THREAD_COLUMNS} FROM message_threads
                 WHERE workspace_org_id = ?1 AND kind = ?2
                   AND participant_a IS ?3 AND participant_b IS ?4 AND group_id IS ?5"
            );
            let existing = tx
                .query_row(
                    &sql,
                    params![new.workspace_org_id, tag.as_str(), a, b, group],
                    thread_from_row,
                )
                .optional()?;
            if let Some(thread) = existing {
                return Ok((thread, false));
            }

            let thread = MessageThread {
                id: Uuid::new_v4(),
                kind: new.kind,
                workspace_org_id: new.workspace_org_id,
                frozen_at: None,
                frozen_by_user_id: None,
                frozen_reason: None,
                created_at: new.now,
            };
            tx.execute(
                "INSERT INTO message_threads
                    (id, kind, workspace_org_id, participant_a, participant_b, group_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![thread.id, tag.as_str(), thread.workspace_org_id, a, b, group, thread.created_at],
            )?;
            tx.commit()?;
            Ok((thread, true))
        })
    }

    pub fn get_thread(&self, id: Uuid) -> Result<Option<MessageThread>> {
        self.with_conn(|conn| query_thread(conn, id))
    }

    /// Threads the user may see in a workspace: direct threads naming them,
    /// threads of their groups, and every org-wide thread. Role filtering of
    /// org-wide kinds is left to the caller.
    pub fn list_user_threads(&self, org_id: Uuid, user_id: Uuid, limit: u32) -> Result<Vec<UserThreadRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.kind, t.workspace_org_id, t.participant_a, t.participant_b,
                        t.group_id, t.frozen_at, t.frozen_by, t.frozen_reason, t.created_at,
                        s.last_read_message_id, COALESCE(s.hidden, 0)
                 FROM message_threads t
                 LEFT JOIN thread_user_state s ON s.thread_id = t.id AND s.user_id = ?2
                 WHERE t.workspace_org_id = ?1
                   AND (t.participant_a = ?2 OR t.participant_b = ?2
                        OR t.group_id IN (SELECT group_id FROM group_members WHERE user_id = ?2)
                        OR t.kind IN ('org_info', 'org_coaches'))
                 ORDER BY t.created_at DESC
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(params![org_id, user_id, limit], |row| {
                    Ok(UserThreadRow {
                        thread: thread_from_row(row)?,
                        last_read_message_id: row.get(10)?,
                        hidden: row.get(11)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Keyset page over a workspace's threads, oldest first.
    pub fn list_threads_page(
        &self,
        org_id: Uuid,
        after: Option<PageAfter>,
        limit: u32,
    ) -> Result<Vec<MessageThread>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {THREAD_COLUMNS} FROM message_threads
                 WHERE workspace_org_id = ?1
                   AND (?2 IS NULL OR (created_at, id) > (?2, ?3))
                 ORDER BY created_at, id
                 LIMIT ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![org_id, after.map(|p| p.created_at), after.map(|p| p.id), limit],
                    thread_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_read_cursor(
        &self,
        thread_id: Uuid,
        user_id: Uuid,
        message_id: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO thread_user_state (thread_id, user_id, last_read_message_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(thread_id, user_id) DO UPDATE SET
                    last_read_message_id = excluded.last_read_message_id,
                    updated_at = excluded.updated_at",
                params![thread_id, user_id, message_id, now],
            )?;
            Ok(())
        })
    }

    pub fn set_thread_hidden(
        &self,
        thread_id: Uuid,
        user_id: Uuid,
        hidden: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO thread_user_state (thread_id, user_id, hidden, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(thread_id, user_id) DO UPDATE SET
                    hidden = excluded.hidden,
                    updated_at = excluded.updated_at",
                params![thread_id, user_id, hidden, now],
            )?;
            Ok(())
        })
    }

    // -- Messages --

    /// Insert a message and its guard flags in one transaction.
    pub fn insert_message(
        &self,
        thread: &MessageThread,
        author_id: Uuid,
        body: &str,
        flags: &[Flag],
        now: DateTime<Utc>,
    ) -> Result<Message> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages (thread_id, author_id, body, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![thread.id, author_id, body, now],
            )?;
            let id = tx.last_insert_rowid();
            for flag in flags {
                tx.execute(
                    "INSERT INTO message_flags (org_id, thread_id, message_id, flag_type, matched_value, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        thread.workspace_org_id,
                        thread.id,
                        id,
                        flag.flag_type.as_str(),
                        flag.matched_value,
                        now,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(Message {
                id,
                thread_id: thread.id,
                author_id,
                body: Some(body.to_string()),
                created_at: now,
                redacted_at: None,
            })
        })
    }

    /// Newest first, optionally strictly older than `before`.
    pub fn get_messages(&self, thread_id: Uuid, before: Option<i64>, limit: u32) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE thread_id = ?1 AND (?2 IS NULL OR id < ?2)
                 ORDER BY id DESC
                 LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![thread_id, before, limit], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Oldest first, at most `limit` rows.
    pub fn get_thread_history(&self, thread_id: Uuid, limit: u32) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE thread_id = ?1 ORDER BY id LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![thread_id, limit], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_message(&self, thread_id: Uuid, message_id: i64) -> Result<Option<Message>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1 AND thread_id = ?2");
            conn.query_row(&sql, params![message_id, thread_id], message_from_row).optional()
        })
    }

    /// Clear bodies of messages in `org_id` created before `cutoff`.
    pub fn redact_messages_before(&self, org_id: Uuid, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE messages SET body = NULL, redacted_at = ?3
                 WHERE redacted_at IS NULL AND created_at < ?2
                   AND thread_id IN (SELECT id FROM message_threads WHERE workspace_org_id = ?1)",
                params![org_id, cutoff, now],
            )?;
            Ok(n)
        })
    }

    // -- Contact requests --

    pub fn insert_contact_request(&self, req: &ContactRequest) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO contact_requests
                    (id, org_id, from_user_id, to_user_id, note, status, thread_id, created_at, responded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    req.id,
                    req.org_id,
                    req.from_user_id,
                    req.to_user_id,
                    req.note,
                    req.status.as_str(),
                    req.thread_id,
                    req.created_at,
                    req.responded_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn pending_contact_request(
        &self,
        org_id: Uuid,
        from_user_id: Uuid,
        to_user_id: Uuid,
    ) -> Result<Option<ContactRequest>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {CONTACT_COLUMNS} FROM contact_requests
                 WHERE org_id = ?1 AND from_user_id = ?2 AND to_user_id = ?3 AND status = 'pending'
                 LIMIT 1"
            );
            conn.query_row(&sql, params![org_id, from_user_id, to_user_id], contact_from_row)
                .optional()
        })
    }

    pub fn get_contact_request(&self, id: Uuid) -> Result<Option<ContactRequest>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {CONTACT_COLUMNS} FROM contact_requests WHERE id = ?1");
            conn.query_row(&sql, [id], contact_from_row).optional()
        })
    }

    /// Move a pending request to `status`. Returns false if it was no longer pending.
    pub fn respond_contact_request(
        &self,
        id: Uuid,
        status: ContactStatus,
        thread_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE contact_requests SET status = ?2, thread_id = ?3, responded_at = ?4
                 WHERE id = ?1 AND status = 'pending'",
                params![id, status.as_str(), thread_id, now],
            )?;
            Ok(n == 1)
        })
    }

    // -- Rate limit counters --

    /// Atomically bump the counter for this window and return the new count.
    pub fn increment_counter(&self, limit_key: &str, window_start: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "INSERT INTO rate_limit_counters (limit_key, window_start, count) VALUES (?1, ?2, 1)
                 ON CONFLICT(limit_key, window_start) DO UPDATE SET count = count + 1
                 RETURNING count",
                params![limit_key, window_start],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn prune_counters_before(&self, window_start: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM rate_limit_counters WHERE window_start < ?1",
                [window_start],
            )?;
            Ok(n)
        })
    }
}

pub(crate) fn query_thread(conn: &Connection, id: Uuid) -> Result<Option<MessageThread>> {
    let sql = format!("SELECT {THREAD_COLUMNS} FROM message_threads WHERE id = ?1");
    conn.query_row(&sql, [id], thread_from_row).optional()
}

fn query_policy(conn: &Connection, org_id: Uuid) -> Result<Option<MessagingPolicy>> {
    conn.query_row(
        "SELECT org_id, guard_mode, sensitive_words, retention_days, charter_version, supervision_enabled
         FROM messaging_policies WHERE org_id = ?1",
        [org_id],
        |row| {
            Ok(MessagingPolicy {
                org_id: row.get(0)?,
                guard_mode: tag_col(row, 1)?,
                sensitive_words: json_col(row, 2)?,
                retention_days: row.get(3)?,
                charter_version: row.get(4)?,
                supervision_enabled: row.get(5)?,
            })
        },
    )
    .optional()
}

fn query_acceptance(
    conn: &Connection,
    org_id: Uuid,
    user_id: Uuid,
    charter_version: u32,
) -> Result<Option<DateTime<Utc>>> {
    conn.query_row(
        "SELECT accepted_at FROM charter_acceptances
         WHERE org_id = ?1 AND user_id = ?2 AND charter_version = ?3",
        params![org_id, user_id, charter_version],
        |row| row.get(0),
    )
    .optional()
}

pub(crate) fn thread_from_row(row: &Row<'_>) -> rusqlite::Result<MessageThread> {
    let tag: ThreadKindTag = tag_col(row, 1)?;
    let kind = ThreadKind::from_columns(tag, row.get(3)?, row.get(4)?, row.get(5)?)
        .map_err(|e| conversion_error(1, e))?;
    Ok(MessageThread {
        id: row.get(0)?,
        kind,
        workspace_org_id: row.get(2)?,
        frozen_at: row.get(6)?,
        frozen_by_user_id: row.get(7)?,
        frozen_reason: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        author_id: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
        redacted_at: row.get(5)?,
    })
}

fn suspension_from_row(row: &Row<'_>) -> rusqlite::Result<Suspension> {
    Ok(Suspension {
        id: row.get(0)?,
        org_id: row.get(1)?,
        user_id: row.get(2)?,
        reason: row.get(3)?,
        suspended_until: row.get(4)?,
        created_at: row.get(5)?,
        created_by: row.get(6)?,
        lifted_at: row.get(7)?,
        lifted_by: row.get(8)?,
    })
}

fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<ContactRequest> {
    Ok(ContactRequest {
        id: row.get(0)?,
        org_id: row.get(1)?,
        from_user_id: row.get(2)?,
        to_user_id: row.get(3)?,
        note: row.get(4)?,
        status: tag_col(row, 5)?,
        thread_id: row.get(6)?,
        created_at: row.get(7)?,
        responded_at: row.get(8)?,
    })
}

/// Parse a TEXT column holding one of the parley-types string tags.
pub(crate) fn tag_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

/// Parse a TEXT column holding JSON.
pub(crate) fn json_col<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
