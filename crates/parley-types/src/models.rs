use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error for a stored or submitted tag that names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct ParseTagError {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a snake_case string-tagged enum with `as_str` / `FromStr`.
/// The same tags are used on the wire (serde) and in SQLite TEXT columns.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $tag:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $tag),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseTagError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok(Self::$variant),)+
                    other => Err(ParseTagError { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(
    /// Workspace-level enforcement strength for content safety.
    GuardMode, "guard mode" {
        Off => "off",
        Flag => "flag",
        Block => "block",
    }
);

string_enum!(Role, "role" {
    Student => "student",
    Coach => "coach",
    Admin => "admin",
});

string_enum!(WorkspaceKind, "workspace kind" {
    Personal => "personal",
    Organization => "organization",
});

string_enum!(
    /// Operation requested against a thread.
    Operation, "operation" {
        Read => "read",
        Write => "write",
        Hide => "hide",
    }
);

string_enum!(ThreadKindTag, "thread kind" {
    StudentCoach => "student_coach",
    CoachCoach => "coach_coach",
    Group => "group",
    GroupInfo => "group_info",
    OrgInfo => "org_info",
    OrgCoaches => "org_coaches",
});

string_enum!(ReportStatus, "report status" {
    Open => "open",
    InReview => "in_review",
    Resolved => "resolved",
});

string_enum!(FlagType, "flag type" {
    Email => "email",
    Phone => "phone",
    Url => "url",
    Keyword => "keyword",
});

string_enum!(ContactStatus, "contact status" {
    Pending => "pending",
    Accepted => "accepted",
    Declined => "declined",
});

impl Role {
    pub fn is_coach_like(&self) -> bool {
        matches!(self, Self::Coach | Self::Admin)
    }
}

impl Operation {
    /// Write-class operations are gated by suspensions and thread freezes.
    pub fn is_write_class(&self) -> bool {
        matches!(self, Self::Write)
    }
}

// -- Identity --

/// Caller identity as supplied by the authentication upstream. Trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub workspace_id: Uuid,
    pub workspace_kind: WorkspaceKind,
}

// -- Policy --

pub const MAX_SENSITIVE_WORDS: usize = 200;
pub const DEFAULT_RETENTION_DAYS: u32 = 365;
pub const MAX_RETENTION_DAYS: u32 = 3650;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingPolicy {
    pub org_id: Uuid,
    pub guard_mode: GuardMode,
    pub sensitive_words: Vec<String>,
    pub retention_days: u32,
    pub charter_version: u32,
    pub supervision_enabled: bool,
}

impl MessagingPolicy {
    /// The policy a workspace has before any admin has touched it.
    pub fn default_for(org_id: Uuid) -> Self {
        Self {
            org_id,
            guard_mode: GuardMode::Flag,
            sensitive_words: Vec::new(),
            retention_days: DEFAULT_RETENTION_DAYS,
            charter_version: 1,
            supervision_enabled: true,
        }
    }
}

/// Partial policy update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyPatch {
    pub guard_mode: Option<GuardMode>,
    pub sensitive_words: Option<Vec<String>>,
    pub retention_days: Option<u32>,
    pub charter_version: Option<u32>,
    pub supervision_enabled: Option<bool>,
}

/// Trim, lowercase, drop empties, dedupe (first occurrence wins) and cap the list.
pub fn normalize_sensitive_words<I, S>(words: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for word in words {
        let word = word.as_ref().trim().to_lowercase();
        if word.is_empty() || !seen.insert(word.clone()) {
            continue;
        }
        out.push(word);
        if out.len() == MAX_SENSITIVE_WORDS {
            break;
        }
    }
    out
}

// -- Suspensions --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suspension {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub reason: String,
    pub suspended_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub lifted_at: Option<DateTime<Utc>>,
    pub lifted_by: Option<Uuid>,
}

impl Suspension {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.lifted_at.is_none() && self.suspended_until.is_none_or(|until| until > now)
    }
}

// -- Threads --

/// Thread kind together with the data that decides who takes part in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThreadKind {
    StudentCoach { student_id: Uuid, coach_id: Uuid },
    CoachCoach { coach_a_id: Uuid, coach_b_id: Uuid },
    Group { group_id: Uuid },
    GroupInfo { group_id: Uuid },
    OrgInfo,
    OrgCoaches,
}

/// How participation in a thread is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participation {
    /// Exactly these two users.
    Direct(Uuid, Uuid),
    /// Members of the group.
    GroupMembers(Uuid),
    /// Members of the owning workspace.
    WorkspaceMembers,
}

impl ThreadKind {
    pub fn tag(&self) -> ThreadKindTag {
        match self {
            Self::StudentCoach { .. } => ThreadKindTag::StudentCoach,
            Self::CoachCoach { .. } => ThreadKindTag::CoachCoach,
            Self::Group { .. } => ThreadKindTag::Group,
            Self::GroupInfo { .. } => ThreadKindTag::GroupInfo,
            Self::OrgInfo => ThreadKindTag::OrgInfo,
            Self::OrgCoaches => ThreadKindTag::OrgCoaches,
        }
    }

    pub fn participation(&self) -> Participation {
        match *self {
            Self::StudentCoach { student_id, coach_id } => Participation::Direct(student_id, coach_id),
            Self::CoachCoach { coach_a_id, coach_b_id } => Participation::Direct(coach_a_id, coach_b_id),
            Self::Group { group_id } | Self::GroupInfo { group_id } => {
                Participation::GroupMembers(group_id)
            }
            Self::OrgInfo | Self::OrgCoaches => Participation::WorkspaceMembers,
        }
    }

    /// Minor threads get the strictest content enforcement.
    pub fn involves_students(&self) -> bool {
        match self {
            Self::StudentCoach { .. } | Self::Group { .. } | Self::GroupInfo { .. } | Self::OrgInfo => true,
            Self::CoachCoach { .. } | Self::OrgCoaches => false,
        }
    }

    /// Flattened storage columns: (tag, participant_a, participant_b, group_id).
    pub fn to_columns(&self) -> (ThreadKindTag, Option<Uuid>, Option<Uuid>, Option<Uuid>) {
        match *self {
            Self::StudentCoach { student_id, coach_id } => {
                (self.tag(), Some(student_id), Some(coach_id), None)
            }
            Self::CoachCoach { coach_a_id, coach_b_id } => {
                (self.tag(), Some(coach_a_id), Some(coach_b_id), None)
            }
            Self::Group { group_id } | Self::GroupInfo { group_id } => {
                (self.tag(), None, None, Some(group_id))
            }
            Self::OrgInfo | Self::OrgCoaches => (self.tag(), None, None, None),
        }
    }

    pub fn from_columns(
        tag: ThreadKindTag,
        participant_a: Option<Uuid>,
        participant_b: Option<Uuid>,
        group_id: Option<Uuid>,
    ) -> Result<Self, ParseTagError> {
        let missing = || ParseTagError {
            kind: "thread participants",
            value: tag.as_str().to_string(),
        };
        Ok(match tag {
            ThreadKindTag::StudentCoach => Self::StudentCoach {
                student_id: participant_a.ok_or_else(missing)?,
                coach_id: participant_b.ok_or_else(missing)?,
            },
            ThreadKindTag::CoachCoach => Self::CoachCoach {
                coach_a_id: participant_a.ok_or_else(missing)?,
                coach_b_id: participant_b.ok_or_else(missing)?,
            },
            ThreadKindTag::Group => Self::Group { group_id: group_id.ok_or_else(missing)? },
            ThreadKindTag::GroupInfo => Self::GroupInfo { group_id: group_id.ok_or_else(missing)? },
            ThreadKindTag::OrgInfo => Self::OrgInfo,
            ThreadKindTag::OrgCoaches => Self::OrgCoaches,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageThread {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: ThreadKind,
    pub workspace_org_id: Uuid,
    pub frozen_at: Option<DateTime<Utc>>,
    pub frozen_by_user_id: Option<Uuid>,
    pub frozen_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MessageThread {
    pub fn is_frozen(&self) -> bool {
        self.frozen_at.is_some()
    }
}

// -- Messages --

/// Messages are redacted (body cleared), never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub thread_id: Uuid,
    pub author_id: Uuid,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub redacted_at: Option<DateTime<Utc>>,
}

/// A content guard finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Flag {
    #[serde(rename = "type")]
    pub flag_type: FlagType,
    pub matched_value: String,
}

/// A flag persisted on the moderation surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFlag {
    pub id: i64,
    pub org_id: Uuid,
    pub thread_id: Uuid,
    pub message_id: i64,
    #[serde(rename = "type")]
    pub flag_type: FlagType,
    pub matched_value: String,
    pub created_at: DateTime<Utc>,
}

// -- Reports --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub message_id: i64,
    pub author_id: Uuid,
    pub excerpt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub redacted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReport {
    pub id: Uuid,
    pub workspace_org_id: Uuid,
    pub thread_id: Uuid,
    pub message_id: Option<i64>,
    pub reported_by: Uuid,
    pub reason: String,
    pub details: Option<String>,
    pub status: ReportStatus,
    pub freeze_applied: bool,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
    pub snapshot: Vec<SnapshotEntry>,
    pub snapshot_digest: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Audit --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub workspace_org_id: Uuid,
    pub actor_user_id: Uuid,
    pub report_id: Option<Uuid>,
    pub thread_id: Option<Uuid>,
    pub action: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// -- Contacts --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRequest {
    pub id: Uuid,
    pub org_id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub note: Option<String>,
    pub status: ContactStatus,
    pub thread_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}
