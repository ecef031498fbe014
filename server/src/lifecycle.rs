//! Background maintenance of the session table
//!
//! Expired sessions are removed on a fixed interval that does not depend on
//! request traffic. Capacity eviction runs in the same pass so the update path
//! never pays for it.

use crate::clock::Clock;
use crate::session_store::SessionStore;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    /// Sessions idle for longer than this are removed
    pub session_ttl: Duration,
    pub interval: Duration,
    /// Population the sweep trims the table down to
    pub max_sessions: usize,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(300),
            interval: Duration::from_secs(60),
            max_sessions: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub evicted: usize,
    pub remaining: usize,
}

/// Runs one sweep pass under a single write-lock acquisition.
pub async fn sweep_once(
    store: &RwLock<SessionStore>,
    clock: &dyn Clock,
    policy: &SweepPolicy,
) -> SweepReport {
    let now = clock.now_millis();
    let mut store = store.write().await;

    let expired = store.sweep_expired(policy.session_ttl.as_millis() as u64, now);
    let evicted = store.enforce_capacity(policy.max_sessions);
    let report = SweepReport {
        expired,
        evicted,
        remaining: store.len(),
    };

    if expired > 0 || evicted > 0 {
        info!(
            "Sweep removed {} expired and {} evicted sessions, {} remaining",
            expired, evicted, report.remaining
        );
    } else {
        debug!("Sweep found nothing to remove ({} live)", report.remaining);
    }
    report
}

/// Spawns the periodic sweeper. The first pass runs one interval after start.
pub fn spawn_sweeper(
    store: Arc<RwLock<SessionStore>>,
    clock: Arc<dyn Clock>,
    policy: SweepPolicy,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(policy.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip the first tick since it fires immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            sweep_once(&store, clock.as_ref(), &policy).await;
        }
    })
}
