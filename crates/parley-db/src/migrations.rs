use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (messaging safety schema)");
        conn.execute_batch(
            "
            CREATE TABLE messaging_policies (
                org_id              BLOB PRIMARY KEY,
                guard_mode          TEXT NOT NULL,
                sensitive_words     TEXT NOT NULL DEFAULT '[]',
                retention_days      INTEGER NOT NULL,
                charter_version     INTEGER NOT NULL CHECK (charter_version >= 1),
                supervision_enabled INTEGER NOT NULL,
                updated_at          TEXT NOT NULL
            );

            CREATE TABLE charter_acceptances (
                org_id          BLOB NOT NULL,
                user_id         BLOB NOT NULL,
                charter_version INTEGER NOT NULL,
                accepted_at     TEXT NOT NULL,
                PRIMARY KEY (org_id, user_id, charter_version)
            );

            CREATE TABLE messaging_suspensions (
                id              BLOB PRIMARY KEY,
                org_id          BLOB NOT NULL,
                user_id         BLOB NOT NULL,
                reason          TEXT NOT NULL,
                suspended_until TEXT,
                created_at      TEXT NOT NULL,
                created_by      BLOB NOT NULL,
                lifted_at       TEXT,
                lifted_by       BLOB
            );

            CREATE INDEX idx_suspensions_user
                ON messaging_suspensions(org_id, user_id, created_at);

            CREATE TABLE workspace_members (
                org_id  BLOB NOT NULL,
                user_id BLOB NOT NULL,
                role    TEXT NOT NULL,
                PRIMARY KEY (org_id, user_id)
            );

            CREATE TABLE group_members (
                group_id BLOB NOT NULL,
                org_id   BLOB NOT NULL,
                user_id  BLOB NOT NULL,
                PRIMARY KEY (group_id, user_id)
            );

            CREATE TABLE message_threads (
                id               BLOB PRIMARY KEY,
                kind             TEXT NOT NULL,
                workspace_org_id BLOB NOT NULL,
                participant_a    BLOB,
                participant_b    BLOB,
                group_id         BLOB,
                frozen_at        TEXT,
                frozen_by        BLOB,
                frozen_reason    TEXT,
                created_at       TEXT NOT NULL
            );

            -- One thread per pair, per group, per org-wide kind
            CREATE UNIQUE INDEX idx_threads_direct
                ON message_threads(workspace_org_id, kind, participant_a, participant_b)
                WHERE participant_a IS NOT NULL;
            CREATE UNIQUE INDEX idx_threads_group
                ON message_threads(workspace_org_id, kind, group_id)
                WHERE group_id IS NOT NULL;
            CREATE UNIQUE INDEX idx_threads_org
                ON message_threads(workspace_org_id, kind)
                WHERE kind IN ('org_info', 'org_coaches');

            CREATE TABLE messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id   BLOB NOT NULL REFERENCES message_threads(id),
                author_id   BLOB NOT NULL,
                body        TEXT,
                created_at  TEXT NOT NULL,
                redacted_at TEXT
            );

            CREATE INDEX idx_messages_thread ON messages(thread_id, id);

            CREATE TABLE message_flags (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id        BLOB NOT NULL,
                thread_id     BLOB NOT NULL REFERENCES message_threads(id),
                message_id    INTEGER NOT NULL REFERENCES messages(id),
                flag_type     TEXT NOT NULL,
                matched_value TEXT NOT NULL,
                created_at    TEXT NOT NULL
            );

            CREATE INDEX idx_flags_org ON message_flags(org_id, id);

            CREATE TABLE thread_user_state (
                thread_id            BLOB NOT NULL REFERENCES message_threads(id),
                user_id              BLOB NOT NULL,
                last_read_message_id INTEGER,
                hidden               INTEGER NOT NULL DEFAULT 0,
                updated_at           TEXT NOT NULL,
                PRIMARY KEY (thread_id, user_id)
            );

            CREATE TABLE contact_requests (
                id           BLOB PRIMARY KEY,
                org_id       BLOB NOT NULL,
                from_user_id BLOB NOT NULL,
                to_user_id   BLOB NOT NULL,
                note         TEXT,
                status       TEXT NOT NULL,
                thread_id    BLOB,
                created_at   TEXT NOT NULL,
                responded_at TEXT
            );

            CREATE INDEX idx_contacts_pair
                ON contact_requests(org_id, from_user_id, to_user_id, status);

            CREATE TABLE message_reports (
                id               BLOB PRIMARY KEY,
                workspace_org_id BLOB NOT NULL,
                thread_id        BLOB NOT NULL REFERENCES message_threads(id),
                message_id       INTEGER,
                reported_by      BLOB NOT NULL,
                reason           TEXT NOT NULL,
                details          TEXT,
                status           TEXT NOT NULL,
                freeze_applied   INTEGER NOT NULL DEFAULT 0,
                resolved_by      BLOB,
                resolved_at      TEXT,
                resolution_note  TEXT,
                snapshot         TEXT NOT NULL,
                snapshot_digest  TEXT NOT NULL,
                created_at       TEXT NOT NULL,
                updated_at       TEXT NOT NULL,
                CHECK ((status = 'resolved') = (resolved_by IS NOT NULL AND resolved_at IS NOT NULL))
            );

            CREATE INDEX idx_reports_org
                ON message_reports(workspace_org_id, created_at, id);

            CREATE TABLE moderation_audit (
                id               BLOB PRIMARY KEY,
                workspace_org_id BLOB NOT NULL,
                actor_user_id    BLOB NOT NULL,
                report_id        BLOB,
                thread_id        BLOB,
                action           TEXT NOT NULL,
                metadata         TEXT NOT NULL DEFAULT '{}',
                created_at       TEXT NOT NULL
            );

            CREATE INDEX idx_audit_org ON moderation_audit(workspace_org_id, created_at);

            CREATE TABLE rate_limit_counters (
                limit_key    TEXT NOT NULL,
                window_start INTEGER NOT NULL,
                count        INTEGER NOT NULL,
                PRIMARY KEY (limit_key, window_start)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
