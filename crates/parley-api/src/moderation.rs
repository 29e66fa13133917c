//! Report lifecycle and the admin moderation surfaces.
//!
//! Participants file reports. Everything else here requires a messaging
//! admin and is bounded per page.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use parley_db::models::{FreezeChange, PageAfter, ReportTransition};
use parley_types::api::{
    AuditPage, CreateReportRequest, ExportPage, ExportedThread, FlagPage, ReportDetail, ReportPage,
    UpdateReportStatusRequest,
};
use parley_types::models::{
    Identity, Message, MessageReport, MessagingPolicy, Operation, ReportStatus, SnapshotEntry,
};

use crate::access::{AccessCheck, authorize_thread, require_messaging_admin};
use crate::audit;
use crate::error::{ApiResult, EngineError};
use crate::policy::load_policy;
use crate::rate_limit::{self, RateAction};
use crate::state::{AppState, run_db};

pub const SNAPSHOT_MESSAGES: u32 = 20;
pub const SNAPSHOT_EXCERPT_CHARS: usize = 500;
pub const REPORTS_PER_PAGE: u32 = 50;
pub const THREADS_PER_EXPORT: u32 = 50;
pub const MESSAGES_PER_THREAD: u32 = 2000;
const MAX_REASON_CHARS: usize = 200;
const MAX_DETAILS_CHARS: usize = 2000;
const MAX_NOTE_CHARS: usize = 2000;
const MAX_LISTED: u32 = 200;

fn encode_cursor(created_at: DateTime<Utc>, id: Uuid) -> String {
    let raw = format!("{}|{}", created_at.to_rfc3339_opts(SecondsFormat::Nanos, true), id);
    URL_SAFE_NO_PAD.encode(raw)
}

fn decode_cursor(cursor: &str) -> ApiResult<PageAfter> {
    let invalid = || EngineError::Validation("invalid_cursor");
    let raw = URL_SAFE_NO_PAD.decode(cursor).map_err(|_| invalid())?;
    let raw = String::from_utf8(raw).map_err(|_| invalid())?;
    let (ts, id) = raw.split_once('|').ok_or_else(invalid)?;
    Ok(PageAfter {
        created_at: DateTime::parse_from_rfc3339(ts).map_err(|_| invalid())?.with_timezone(&Utc),
        id: id.parse().map_err(|_| invalid())?,
    })
}

fn excerpt(message: &Message) -> SnapshotEntry {
    SnapshotEntry {
        message_id: message.id,
        author_id: message.author_id,
        excerpt: message
            .body
            .as_ref()
            .map(|b| b.chars().take(SNAPSHOT_EXCERPT_CHARS).collect()),
        created_at: message.created_at,
        redacted: message.redacted_at.is_some(),
    }
}

/// Hex SHA-256 over the serialized snapshot.
pub fn snapshot_digest(snapshot: &[SnapshotEntry]) -> anyhow::Result<String> {
    let bytes = serde_json::to_vec(snapshot)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

fn bounded_text(value: Option<String>, max: usize, code: &'static str) -> ApiResult<Option<String>> {
    let value = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    if value.as_ref().is_some_and(|v| v.chars().count() > max) {
        return Err(EngineError::Validation(code));
    }
    Ok(value)
}

async fn admin_policy(state: &AppState, identity: &Identity) -> ApiResult<MessagingPolicy> {
    let policy = load_policy(state, identity.workspace_id).await?;
    if let Err(e) = require_messaging_admin(identity, &policy) {
        warn!(user = %identity.user_id, role = %identity.role, "Moderation access denied");
        return Err(e);
    }
    Ok(policy)
}

async fn report_in_workspace(state: &AppState, identity: &Identity, report_id: Uuid) -> ApiResult<MessageReport> {
    run_db(state, "reports.get", move |db| db.get_report(report_id))
        .await?
        .filter(|r| r.workspace_org_id == identity.workspace_id)
        .ok_or(EngineError::NotFound)
}

/// File a report on a thread, or on one message in it.
///
/// Allowed while suspended, while the thread is frozen, and before the
/// charter is accepted.
pub async fn create_report(
    state: &AppState,
    identity: &Identity,
    req: CreateReportRequest,
) -> ApiResult<MessageReport> {
    rate_limit::enforce(state, identity.user_id, RateAction::ReportCreate).await?;

    let reason = req.reason.trim().to_string();
    if reason.is_empty() || reason.chars().count() > MAX_REASON_CHARS {
        return Err(EngineError::Validation("invalid_reason"));
    }
    let details = bounded_text(req.details, MAX_DETAILS_CHARS, "details_too_long")?;

    let check = AccessCheck {
        operation: Operation::Read,
        charter_exempt: true,
    };
    let access = authorize_thread(state, identity, req.thread_id, check).await?;

    let (thread_id, message_id) = (access.thread.id, req.message_id);
    let recent = run_db(state, "reports.snapshot", move |db| {
        if let Some(id) = message_id {
            if db.get_message(thread_id, id)?.is_none() {
                return Ok(None);
            }
        }
        let before = message_id.map(|id| id + 1);
        db.get_messages(thread_id, before, SNAPSHOT_MESSAGES).map(Some)
    })
    .await?
    .ok_or(EngineError::NotFound)?;

    let snapshot: Vec<SnapshotEntry> = recent.iter().rev().map(excerpt).collect();
    let snapshot_digest = snapshot_digest(&snapshot).map_err(|e| {
        warn!("Snapshot digest failed: {}", e);
        EngineError::DependencyUnavailable
    })?;

    let now = state.now();
    let report = MessageReport {
        id: Uuid::new_v4(),
        workspace_org_id: identity.workspace_id,
        thread_id,
        message_id,
        reported_by: identity.user_id,
        reason,
        details,
        status: ReportStatus::Open,
        freeze_applied: false,
        resolved_by: None,
        resolved_at: None,
        resolution_note: None,
        snapshot,
        snapshot_digest,
        created_at: now,
        updated_at: now,
    };
    let row = report.clone();
    run_db(state, "reports.insert", move |db| db.insert_report(&row)).await?;

    info!(report = %report.id, thread = %thread_id, by = %identity.user_id, "Report filed");
    state.audit.record(audit::entry(
        identity,
        "report.created",
        Some(report.id),
        Some(thread_id),
        json!({ "message_id": message_id, "snapshot_messages": report.snapshot.len() }),
        now,
    ));
    Ok(report)
}

pub async fn update_report_status(
    state: &AppState,
    identity: &Identity,
    report_id: Uuid,
    req: UpdateReportStatusRequest,
) -> ApiResult<MessageReport> {
    admin_policy(state, identity).await?;
    let note = bounded_text(req.resolution_note, MAX_NOTE_CHARS, "resolution_note_too_long")?;
    let current = report_in_workspace(state, identity, report_id).await?;

    if req.expected_status.is_some_and(|expected| expected != current.status) {
        return Err(EngineError::Conflict("report_status_conflict"));
    }

    let freeze = req.freeze_thread.map(|freeze| {
        if freeze {
            FreezeChange::Freeze {
                by: identity.user_id,
                reason: note.clone().unwrap_or_else(|| current.reason.clone()),
            }
        } else {
            FreezeChange::Unfreeze
        }
    });
    let (from, to) = (current.status, req.status);
    let noop = from == to && freeze.is_none() && note.is_none();
    let now = state.now();

    let updated = if noop {
        current
    } else {
        let transition = ReportTransition {
            report_id,
            from,
            to,
            actor: identity.user_id,
            resolution_note: note,
            freeze: freeze.clone(),
            now,
        };
        run_db(state, "reports.transition", move |db| db.apply_report_transition(&transition))
            .await?
            .ok_or(EngineError::Conflict("report_status_conflict"))?
    };

    match &freeze {
        Some(FreezeChange::Freeze { .. }) => {
            info!(report = %report_id, thread = %updated.thread_id, admin = %identity.user_id, "Thread frozen")
        }
        Some(FreezeChange::Unfreeze) => {
            info!(report = %report_id, thread = %updated.thread_id, admin = %identity.user_id, "Thread unfrozen")
        }
        None => {}
    }
    state.audit.record(audit::entry(
        identity,
        "report.status_updated",
        Some(report_id),
        Some(updated.thread_id),
        json!({
            "from": from,
            "to": to,
            "freeze_thread": req.freeze_thread,
            "reopened": from == ReportStatus::Resolved && to != ReportStatus::Resolved,
            "noop": noop,
        }),
        now,
    ));
    Ok(updated)
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportListQuery {
    pub status: Option<ReportStatus>,
    pub cursor: Option<String>,
}

/// Newest first, one bounded page.
pub async fn list_reports(state: &AppState, identity: &Identity, query: ReportListQuery) -> ApiResult<ReportPage> {
    admin_policy(state, identity).await?;
    let before = query.cursor.as_deref().map(decode_cursor).transpose()?;

    let (org_id, status) = (identity.workspace_id, query.status);
    let mut reports = run_db(state, "reports.list", move |db| {
        db.list_reports(org_id, status, before, REPORTS_PER_PAGE + 1)
    })
    .await?;

    let truncated = reports.len() > REPORTS_PER_PAGE as usize;
    reports.truncate(REPORTS_PER_PAGE as usize);
    let next_cursor = if truncated {
        reports.last().map(|r| encode_cursor(r.created_at, r.id))
    } else {
        None
    };
    Ok(ReportPage {
        reports,
        next_cursor,
        truncated,
    })
}

/// A report with its thread's history. Every view is audited.
pub async fn report_detail(state: &AppState, identity: &Identity, report_id: Uuid) -> ApiResult<ReportDetail> {
    admin_policy(state, identity).await?;
    let report = report_in_workspace(state, identity, report_id).await?;

    let thread_id = report.thread_id;
    let (thread, mut messages) = run_db(state, "reports.detail", move |db| {
        Ok((db.get_thread(thread_id)?, db.get_thread_history(thread_id, MESSAGES_PER_THREAD + 1)?))
    })
    .await?;
    let thread = thread.ok_or(EngineError::NotFound)?;
    let messages_truncated = messages.len() > MESSAGES_PER_THREAD as usize;
    messages.truncate(MESSAGES_PER_THREAD as usize);

    state.audit.record(audit::entry(
        identity,
        "report.thread_viewed",
        Some(report_id),
        Some(thread_id),
        json!({ "messages": messages.len(), "truncated": messages_truncated }),
        state.now(),
    ));
    Ok(ReportDetail {
        report,
        thread,
        messages,
        messages_truncated,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub cursor: Option<String>,
}

/// One page of the workspace's threads with their history, oldest first.
pub async fn export_workspace(state: &AppState, identity: &Identity, query: ExportQuery) -> ApiResult<ExportPage> {
    admin_policy(state, identity).await?;
    let after = query.cursor.as_deref().map(decode_cursor).transpose()?;

    let org_id = identity.workspace_id;
    let (threads, threads_truncated) = run_db(state, "moderation.export", move |db| {
        let mut threads = db.list_threads_page(org_id, after, THREADS_PER_EXPORT + 1)?;
        let truncated = threads.len() > THREADS_PER_EXPORT as usize;
        threads.truncate(THREADS_PER_EXPORT as usize);

        let mut exported = Vec::with_capacity(threads.len());
        for thread in threads {
            let mut messages = db.get_thread_history(thread.id, MESSAGES_PER_THREAD + 1)?;
            let messages_truncated = messages.len() > MESSAGES_PER_THREAD as usize;
            messages.truncate(MESSAGES_PER_THREAD as usize);
            exported.push(ExportedThread {
                thread,
                messages,
                messages_truncated,
            });
        }
        Ok((exported, truncated))
    })
    .await?;

    let next_cursor = if threads_truncated {
        threads.last().map(|t| encode_cursor(t.thread.created_at, t.thread.id))
    } else {
        None
    };
    let truncated = threads_truncated || threads.iter().any(|t| t.messages_truncated);

    info!(org = %org_id, admin = %identity.user_id, threads = threads.len(), "Workspace export page served");
    state.audit.record(audit::entry(
        identity,
        "workspace.exported",
        None,
        None,
        json!({ "threads": threads.len(), "truncated": truncated }),
        state.now(),
    ));
    Ok(ExportPage {
        threads,
        next_cursor,
        truncated,
    })
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub report_id: Option<Uuid>,
}

fn default_limit() -> u32 {
    50
}

pub async fn list_flags(state: &AppState, identity: &Identity, limit: u32) -> ApiResult<FlagPage> {
    admin_policy(state, identity).await?;
    let (org_id, limit) = (identity.workspace_id, limit.clamp(1, MAX_LISTED));
    let mut flags = run_db(state, "moderation.flags", move |db| db.list_flags(org_id, limit + 1)).await?;
    let truncated = flags.len() > limit as usize;
    flags.truncate(limit as usize);
    Ok(FlagPage { flags, truncated })
}

pub async fn list_audit(
    state: &AppState,
    identity: &Identity,
    report_id: Option<Uuid>,
    limit: u32,
) -> ApiResult<AuditPage> {
    admin_policy(state, identity).await?;
    let (org_id, limit) = (identity.workspace_id, limit.clamp(1, MAX_LISTED));
    let mut entries = run_db(state, "moderation.audit", move |db| {
        db.list_audit_entries(org_id, report_id, limit + 1)
    })
    .await?;
    let truncated = entries.len() > limit as usize;
    entries.truncate(limit as usize);
    Ok(AuditPage { entries, truncated })
}

// -- Handlers --

pub async fn post_report(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateReportRequest>,
) -> ApiResult<(StatusCode, Json<MessageReport>)> {
    let report = create_report(&state, &identity, req).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn get_reports(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ReportListQuery>,
) -> ApiResult<Json<ReportPage>> {
    list_reports(&state, &identity, query).await.map(Json)
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<ReportDetail>> {
    report_detail(&state, &identity, report_id).await.map(Json)
}

pub async fn post_report_status(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UpdateReportStatusRequest>,
) -> ApiResult<Json<MessageReport>> {
    update_report_status(&state, &identity, report_id, req).await.map(Json)
}

pub async fn get_flags(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<FlagPage>> {
    list_flags(&state, &identity, query.limit).await.map(Json)
}

pub async fn get_export(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Json<ExportPage>> {
    export_workspace(&state, &identity, query).await.map(Json)
}

pub async fn get_audit(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<AuditPage>> {
    list_audit(&state, &identity, query.report_id, query.limit).await.map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DenyReason;
    use crate::messages::send_message;
    use crate::test_support::{Harness, harness};
    use crate::threads::open_thread;
    use parley_types::api::CreateThreadRequest;
    use parley_types::models::{MessageThread, Role};

    struct Room {
        admin: Identity,
        coach: Identity,
        student: Identity,
        thread: MessageThread,
    }

    async fn room(h: &Harness) -> Room {
        let admin = h.member(Role::Admin);
        let coach = h.member(Role::Coach);
        let student = h.member(Role::Student);
        let (thread, _) = open_thread(
            &h.state,
            &coach,
            CreateThreadRequest::Direct {
                participant_id: student.user_id,
            },
        )
        .await
        .unwrap();
        Room {
            admin,
            coach,
            student,
            thread,
        }
    }

    fn report_req(thread_id: Uuid, message_id: Option<i64>) -> CreateReportRequest {
        CreateReportRequest {
            thread_id,
            message_id,
            reason: "asked for my phone number".into(),
            details: None,
        }
    }

    fn status_req(status: ReportStatus, freeze: Option<bool>) -> UpdateReportStatusRequest {
        UpdateReportStatusRequest {
            status,
            freeze_thread: freeze,
            resolution_note: None,
            expected_status: None,
        }
    }

    #[test]
    fn cursor_round_trip_and_garbage() {
        let at = Utc::now();
        let id = Uuid::new_v4();
        let page = decode_cursor(&encode_cursor(at, id)).unwrap();
        assert_eq!(page, PageAfter { created_at: at, id });
        assert!(matches!(decode_cursor("not a cursor"), Err(EngineError::Validation("invalid_cursor"))));
    }

    #[tokio::test]
    async fn snapshot_stops_at_reported_message() {
        let h = harness();
        let r = room(&h).await;
        let mut ids = Vec::new();
        for i in 0..25 {
            let sent = send_message(&h.state, &r.coach, r.thread.id, format!("line {i} {}", "x".repeat(600)))
                .await
                .unwrap();
            ids.push(sent.message.id);
        }

        let report = create_report(&h.state, &r.student, report_req(r.thread.id, Some(ids[22])))
            .await
            .unwrap();
        assert_eq!(report.snapshot.len(), SNAPSHOT_MESSAGES as usize);
        assert_eq!(report.snapshot.last().unwrap().message_id, ids[22]);
        assert_eq!(report.snapshot[0].message_id, ids[3]);
        assert!(report.snapshot.iter().all(|e| e.excerpt.as_ref().unwrap().chars().count() <= 500));
        assert_eq!(report.snapshot_digest, snapshot_digest(&report.snapshot).unwrap());
        assert_eq!(report.status, ReportStatus::Open);
        assert!(!report.freeze_applied);

        let err = create_report(&h.state, &r.student, report_req(r.thread.id, Some(9999)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound));
    }

    #[tokio::test]
    async fn reporting_works_without_charter_and_while_suspended() {
        let h = harness();
        let r = room(&h).await;
        let newcomer = h.newcomer(Role::Student);
        let (thread, _) = open_thread(
            &h.state,
            &r.coach,
            CreateThreadRequest::Direct {
                participant_id: newcomer.user_id,
            },
        )
        .await
        .unwrap();
        create_report(&h.state, &newcomer, report_req(thread.id, None)).await.unwrap();

        crate::suspension::suspend_user(
            &h.state,
            &r.admin,
            parley_types::api::CreateSuspensionRequest {
                user_id: r.student.user_id,
                reason: "spam".into(),
                suspended_until: None,
            },
        )
        .await
        .unwrap();
        create_report(&h.state, &r.student, report_req(r.thread.id, None)).await.unwrap();
    }

    #[tokio::test]
    async fn resolve_with_freeze_then_reopen() {
        let h = harness();
        let r = room(&h).await;
        let report = create_report(&h.state, &r.student, report_req(r.thread.id, None)).await.unwrap();

        let resolved = update_report_status(&h.state, &r.admin, report.id, status_req(ReportStatus::Resolved, Some(true)))
            .await
            .unwrap();
        assert_eq!(resolved.resolved_by, Some(r.admin.user_id));
        assert!(resolved.freeze_applied);
        let thread = h.state.db.get_thread(r.thread.id).unwrap().unwrap();
        assert_eq!(thread.frozen_reason.as_deref(), Some("asked for my phone number"));

        for who in [&r.coach, &r.student] {
            let err = send_message(&h.state, who, r.thread.id, "hello?".into()).await.unwrap_err();
            assert!(matches!(err, EngineError::Forbidden(DenyReason::ThreadFrozen)));
        }

        let again = update_report_status(&h.state, &r.admin, report.id, status_req(ReportStatus::Resolved, None))
            .await
            .unwrap();
        assert_eq!(again.resolved_at, resolved.resolved_at);

        let reopened = update_report_status(&h.state, &r.admin, report.id, status_req(ReportStatus::InReview, Some(false)))
            .await
            .unwrap();
        assert_eq!(reopened.resolved_by, None);
        assert!(!h.state.db.get_thread(r.thread.id).unwrap().unwrap().is_frozen());

        h.state.audit.flush().await;
        let entries = h.state.db.list_audit_entries(h.org, Some(report.id), 10).unwrap();
        let updates: Vec<_> = entries.iter().filter(|e| e.action == "report.status_updated").collect();
        assert_eq!(updates.len(), 3);
        assert!(updates.iter().any(|e| e.metadata["reopened"] == json!(true)));
    }

    #[tokio::test]
    async fn stale_expected_status_conflicts() {
        let h = harness();
        let r = room(&h).await;
        let report = create_report(&h.state, &r.student, report_req(r.thread.id, None)).await.unwrap();
        update_report_status(&h.state, &r.admin, report.id, status_req(ReportStatus::InReview, None))
            .await
            .unwrap();

        let mut stale = status_req(ReportStatus::Resolved, None);
        stale.expected_status = Some(ReportStatus::Open);
        let err = update_report_status(&h.state, &r.admin, report.id, stale).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict("report_status_conflict")));
    }

    #[tokio::test]
    async fn moderation_requires_messaging_admin() {
        let h = harness();
        let r = room(&h).await;
        let report = create_report(&h.state, &r.student, report_req(r.thread.id, None)).await.unwrap();
        let err = update_report_status(&h.state, &r.coach, report.id, status_req(ReportStatus::Resolved, None))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(DenyReason::NotMessagingAdmin)));
        assert!(list_reports(&h.state, &r.student, ReportListQuery::default()).await.is_err());
    }

    #[tokio::test]
    async fn detail_view_is_audited() {
        let h = harness();
        let r = room(&h).await;
        send_message(&h.state, &r.coach, r.thread.id, "hi".into()).await.unwrap();
        let report = create_report(&h.state, &r.student, report_req(r.thread.id, None)).await.unwrap();

        let detail = report_detail(&h.state, &r.admin, report.id).await.unwrap();
        assert_eq!(detail.messages.len(), 1);
        assert!(!detail.messages_truncated);

        h.state.audit.flush().await;
        let entries = h.state.db.list_audit_entries(h.org, Some(report.id), 10).unwrap();
        assert!(entries.iter().any(|e| e.action == "report.thread_viewed" && e.actor_user_id == r.admin.user_id));
    }

    #[tokio::test]
    async fn report_pages_are_bounded() {
        let h = harness();
        let r = room(&h).await;
        for _ in 0..(REPORTS_PER_PAGE + 5) {
            h.clock.advance(chrono::Duration::seconds(31));
            create_report(&h.state, &r.student, report_req(r.thread.id, None)).await.unwrap();
        }

        let first = list_reports(&h.state, &r.admin, ReportListQuery::default()).await.unwrap();
        assert_eq!(first.reports.len(), REPORTS_PER_PAGE as usize);
        assert!(first.truncated);
        let second = list_reports(
            &h.state,
            &r.admin,
            ReportListQuery {
                status: Some(ReportStatus::Open),
                cursor: first.next_cursor.clone(),
            },
        )
        .await
        .unwrap();
        assert_eq!(second.reports.len(), 5);
        assert!(!second.truncated);
        assert!(second.reports[0].created_at < first.reports.last().unwrap().created_at);
    }

    #[tokio::test]
    async fn export_walks_threads_in_pages() {
        let h = harness();
        let admin = h.member(Role::Admin);
        let coach = h.member(Role::Coach);
        for _ in 0..(THREADS_PER_EXPORT + 1) {
            let student = h.member(Role::Student);
            h.clock.advance(chrono::Duration::seconds(7));
            open_thread(
                &h.state,
                &coach,
                CreateThreadRequest::Direct {
                    participant_id: student.user_id,
                },
            )
            .await
            .unwrap();
        }

        let first = export_workspace(&h.state, &admin, ExportQuery::default()).await.unwrap();
        assert_eq!(first.threads.len(), THREADS_PER_EXPORT as usize);
        assert!(first.truncated);
        let rest = export_workspace(&h.state, &admin, ExportQuery { cursor: first.next_cursor })
            .await
            .unwrap();
        assert_eq!(rest.threads.len(), 1);
        assert!(!rest.truncated);
        assert!(rest.next_cursor.is_none());
    }
}
