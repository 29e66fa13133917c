use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    AuditEntry, ContactStatus, Flag, Message, MessageFlag, MessageReport, MessageThread,
    Operation, ReportStatus, Role, Suspension, WorkspaceKind,
};

// -- JWT Claims --

/// Bearer token claims issued by the platform's auth service. Parley only
/// verifies them; it never issues tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub workspace_id: Uuid,
    pub workspace_kind: WorkspaceKind,
    pub exp: usize,
}

// -- Decisions --

/// Protocol-agnostic outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason_code: Option<String>,
    pub http_status_hint: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    pub operation: Operation,
}

// -- Charter --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharterStatus {
    pub charter_version: u32,
    pub must_accept: bool,
    pub accepted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcceptCharterRequest {
    pub charter_version: u32,
}

// -- Threads --

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreateThreadRequest {
    /// 1:1 thread; kind is derived from the two roles.
    Direct { participant_id: Uuid },
    Group { group_id: Uuid },
    GroupInfo { group_id: Uuid },
    OrgInfo,
    OrgCoaches,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreadSummary {
    #[serde(flatten)]
    pub thread: MessageThread,
    pub last_read_message_id: Option<i64>,
    pub hidden: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: Message,
    /// Flags recorded on the moderation surface for this message.
    pub flags: Vec<Flag>,
}

#[derive(Debug, Serialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    /// Pass as `before` to fetch older messages.
    pub next_before: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadCursorRequest {
    pub last_read_message_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HideThreadRequest {
    pub hidden: bool,
}

// -- Contacts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactRequestBody {
    pub target_user_id: Uuid,
    pub note: Option<String>,
}

/// Same body whether or not the target exists, to avoid leaking membership.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactSubmitted {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactRespondRequest {
    pub accept: bool,
}

#[derive(Debug, Serialize)]
pub struct ContactRespondResponse {
    pub id: Uuid,
    pub status: ContactStatus,
    pub thread_id: Option<Uuid>,
}

// -- Moderation --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateReportRequest {
    pub thread_id: Uuid,
    pub message_id: Option<i64>,
    pub reason: String,
    pub details: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateReportStatusRequest {
    pub status: ReportStatus,
    /// `true` freezes the thread, `false` lifts the freeze, absent leaves it.
    pub freeze_thread: Option<bool>,
    pub resolution_note: Option<String>,
    /// Status the moderator saw; a mismatch is rejected as a conflict.
    pub expected_status: Option<ReportStatus>,
}

#[derive(Debug, Serialize)]
pub struct ReportPage {
    pub reports: Vec<MessageReport>,
    pub next_cursor: Option<String>,
    pub truncated: bool,
}

#[derive(Debug, Serialize)]
pub struct ReportDetail {
    pub report: MessageReport,
    pub thread: MessageThread,
    pub messages: Vec<Message>,
    pub messages_truncated: bool,
}

#[derive(Debug, Serialize)]
pub struct ExportedThread {
    pub thread: MessageThread,
    pub messages: Vec<Message>,
    pub messages_truncated: bool,
}

#[derive(Debug, Serialize)]
pub struct ExportPage {
    pub threads: Vec<ExportedThread>,
    pub next_cursor: Option<String>,
    /// True when any limit was hit on this page.
    pub truncated: bool,
}

#[derive(Debug, Serialize)]
pub struct FlagPage {
    pub flags: Vec<MessageFlag>,
    pub truncated: bool,
}

#[derive(Debug, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub truncated: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSuspensionRequest {
    pub user_id: Uuid,
    pub reason: String,
    pub suspended_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SuspensionList {
    pub suspensions: Vec<Suspension>,
}
