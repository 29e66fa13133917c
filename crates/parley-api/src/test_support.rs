use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use parley_db::Database;
use parley_types::models::{Identity, Role, WorkspaceKind};

use crate::clock::ManualClock;
use crate::state::{AppState, AppStateInner};

pub(crate) struct Harness {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub org: Uuid,
}

pub(crate) fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()));
    let db = Database::open_in_memory().unwrap();
    let state = AppStateInner::new(db, "test-secret", clock.clone(), Duration::from_secs(2));
    Harness {
        state,
        clock,
        org: Uuid::new_v4(),
    }
}

pub(crate) fn state() -> (AppState, Uuid) {
    let h = harness();
    (h.state, h.org)
}

pub(crate) fn admin(org: Uuid) -> Identity {
    identity(org, Role::Admin)
}

pub(crate) fn identity(org: Uuid, role: Role) -> Identity {
    Identity {
        user_id: Uuid::new_v4(),
        username: format!("{role}-{}", &Uuid::new_v4().to_string()[..8]),
        role,
        workspace_id: org,
        workspace_kind: WorkspaceKind::Organization,
    }
}

impl Harness {
    /// A workspace member who has not accepted the charter yet.
    pub fn newcomer(&self, role: Role) -> Identity {
        let who = identity(self.org, role);
        self.state.db.add_workspace_member(self.org, who.user_id, role).unwrap();
        who
    }

    /// A workspace member who accepted the current charter.
    pub fn member(&self, role: Role) -> Identity {
        let who = self.newcomer(role);
        let version = self
            .state
            .db
            .get_policy(self.org)
            .unwrap()
            .map_or(1, |p| p.charter_version);
        self.state
            .db
            .accept_charter(self.org, who.user_id, version, self.state.now())
            .unwrap();
        who
    }
}
