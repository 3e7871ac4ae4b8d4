use chrono::{Duration as ChronoDuration, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use sqlx::PgPool;
use std::time::Duration;

use crate::models::{METHOD_ALL_FIGHTS_COMPLETE, METHOD_FAILSAFE_FORCE_TIMEOUT, METHOD_FAILSAFE_TIMEOUT};
use crate::store::{self, ReconcilerHealth};

pub const RECONCILER_TICK_SECS: u64 = 3600;

/// A fight still LIVE this long after its event's effective start is stuck.
pub const FIGHT_TIMEOUT_HOURS: i64 = 6;

/// An event still LIVE this long after its effective start gets
/// force-completed outright, fights first.
pub const EVENT_TIMEOUT_HOURS: i64 = 8;

#[derive(Debug, Default, Clone, Serialize)]
pub struct ReconcileSummary {
    pub fights_timed_out: u64,
    pub events_all_done: u64,
    pub fights_force_timed_out: u64,
    pub events_force_timed_out: u64,
}

impl ReconcileSummary {
    pub fn total(&self) -> u64 {
        self.fights_timed_out
            + self.events_all_done
            + self.fights_force_timed_out
            + self.events_force_timed_out
    }
}

/// The correctness backstop. Runs on its own slow tick and forces state
/// forward with wall-clock thresholds, independently of whether the live
/// tracker ever ran for an event.
pub async fn run_failsafe_reconciler(pool: PgPool) {
    info!(
        "failsafe reconciler running, tick every {}s",
        RECONCILER_TICK_SECS
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(RECONCILER_TICK_SECS));
    loop {
        ticker.tick().await;
        match reconcile_once(&pool).await {
            Ok(summary) if summary.total() > 0 => {
                info!(
                    "failsafe reconciler: {} stuck fights completed, {} events all-done, \
                     {} fights force-completed, {} events force-completed",
                    summary.fights_timed_out,
                    summary.events_all_done,
                    summary.fights_force_timed_out,
                    summary.events_force_timed_out
                );
            }
            Ok(_) => debug!("failsafe reconciler: nothing to do"),
            Err(e) => error!("failsafe reconciler tick failed: {}", e),
        }
    }
}

/// Three ordered passes, each idempotent and safe to run when nothing is
/// stuck. Every query excludes MANUAL-mode events and manually decided
/// fights at the store level.
pub async fn reconcile_once(pool: &PgPool) -> Result<ReconcileSummary, sqlx::Error> {
    let mut summary = ReconcileSummary::default();

    // Pass 1: fights stuck in LIVE long after their event started.
    let fight_cutoff = Utc::now() - ChronoDuration::hours(FIGHT_TIMEOUT_HOURS);
    for fight in store::stuck_live_fights(pool, fight_cutoff).await? {
        if store::force_complete_fight(pool, fight.id, METHOD_FAILSAFE_TIMEOUT).await? {
            warn!(
                "force-completed stuck fight {} ({}) on event {}",
                fight.id,
                fight.matchup(),
                fight.event_id
            );
            summary.fights_timed_out += 1;
        }
    }

    // Pass 2: live events whose whole card is already settled.
    for event in store::live_events_with_all_fights_done(pool).await? {
        if store::complete_event(pool, event.id, METHOD_ALL_FIGHTS_COMPLETE).await? {
            info!(
                "completed event {} ({}): every fight is settled",
                event.id, event.name
            );
            summary.events_all_done += 1;
        }
    }

    // Pass 3: events past the hard timeout. Remaining fights go first so
    // the all-fights-complete invariant holds when the event is closed.
    let event_cutoff = Utc::now() - ChronoDuration::hours(EVENT_TIMEOUT_HOURS);
    for event in store::timed_out_live_events(pool, event_cutoff).await? {
        for fight in store::incomplete_fights(pool, event.id).await? {
            if store::force_complete_fight(pool, fight.id, METHOD_FAILSAFE_FORCE_TIMEOUT).await? {
                summary.fights_force_timed_out += 1;
            }
        }
        if store::complete_event(pool, event.id, METHOD_FAILSAFE_FORCE_TIMEOUT).await? {
            warn!(
                "force-completed timed-out event {} ({})",
                event.id, event.name
            );
            summary.events_force_timed_out += 1;
        }
    }

    Ok(summary)
}

/// Side-effect-free health view for operational tooling: what would the
/// passes act on right now, and how old is the oldest straggler.
pub async fn reconciler_health(pool: &PgPool) -> Result<ReconcilerHealth, sqlx::Error> {
    let fight_cutoff = Utc::now() - ChronoDuration::hours(FIGHT_TIMEOUT_HOURS);
    store::reconciler_health(pool, fight_cutoff).await
}
