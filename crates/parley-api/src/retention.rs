use std::time::Duration;

use tracing::{info, warn};

use crate::state::{AppState, try_db};

/// Counter windows older than this are dropped.
const COUNTER_HORIZON_SECS: i64 = 3600;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub redacted_messages: usize,
    pub pruned_counters: usize,
}

/// Background task that enforces message retention.
///
/// Runs on an interval, clears bodies of messages older than each
/// workspace's retention window and drops stale rate-limit counters.
/// Report snapshots keep their excerpts.
pub async fn run_retention_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match sweep(&state).await {
            Ok(stats) => {
                if stats != SweepStats::default() {
                    info!(
                        "Retention: redacted {} messages, pruned {} counter windows",
                        stats.redacted_messages, stats.pruned_counters
                    );
                }
            }
            Err(e) => {
                warn!("Retention error: {:#}", e);
            }
        }
    }
}

pub async fn sweep(state: &AppState) -> anyhow::Result<SweepStats> {
    let now = state.now();
    try_db(&state.db, state.db_timeout, move |db| {
        let mut stats = SweepStats::default();
        for (org_id, days) in db.retention_windows()? {
            let cutoff = now - chrono::Duration::days(i64::from(days));
            stats.redacted_messages += db.redact_messages_before(org_id, cutoff, now)?;
        }
        stats.pruned_counters = db.prune_counters_before(now.timestamp() - COUNTER_HORIZON_SECS)?;
        Ok(stats)
    })
    .await
}
