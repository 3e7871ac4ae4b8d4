use chrono::{DateTime, Utc};
use log::{error, info, warn};
use once_cell::sync::OnceCell;
use scraper_client::EventScraper;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::delta;
use crate::error::LiveError;
use crate::matching;
use crate::notifier;
use crate::store;

pub const SCRAPE_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub event_id: i64,
    pub scrape_target: String,
    pub interval_secs: u64,
}

/// Read-only observability snapshot; never mutates tracker state.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerStatus {
    pub is_running: bool,
    pub event_id: Option<i64>,
    pub event_name: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_scrape_at: Option<DateTime<Utc>>,
    pub total_scrapes: u64,
    pub fights_updated: u64,
    pub last_error: Option<String>,
}

impl TrackerStatus {
    fn idle() -> Self {
        TrackerStatus {
            is_running: false,
            event_id: None,
            event_name: None,
            started_at: None,
            last_scrape_at: None,
            total_scrapes: 0,
            fights_updated: 0,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct PollStats {
    event_name: Option<String>,
    last_scrape_at: Option<DateTime<Utc>>,
    total_scrapes: u64,
    fights_updated: u64,
    last_error: Option<String>,
}

struct ActiveTracking {
    config: TrackerConfig,
    started_at: DateTime<Utc>,
    stats: Arc<Mutex<PollStats>>,
    handle: JoinHandle<()>,
}

type TrackingSlot = Arc<Mutex<Option<ActiveTracking>>>;

/// The one live tracker this process is allowed to run. Exactly one event
/// is tracked at a time; callers must stop the current tracking before
/// starting another.
pub struct LiveTracker {
    pool: PgPool,
    scraper: Arc<dyn EventScraper>,
    active: TrackingSlot,
}

static INSTANCE: OnceCell<LiveTracker> = OnceCell::new();

impl LiveTracker {
    pub fn new(pool: PgPool, scraper: Arc<dyn EventScraper>) -> Self {
        Self {
            pool,
            scraper,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn init_global(pool: PgPool, scraper: Arc<dyn EventScraper>) -> &'static LiveTracker {
        INSTANCE.get_or_init(|| Self::new(pool, scraper))
    }

    pub fn global() -> Option<&'static LiveTracker> {
        INSTANCE.get()
    }

    /// Begins tracking one event: an immediate poll-and-apply, then a
    /// recurring poll every `interval_secs`. Fails if a tracking is already
    /// active, leaving that tracking untouched.
    pub async fn start(&self, config: TrackerConfig) -> Result<(), LiveError> {
        let mut slot = self.active.lock().await;
        if let Some(active) = slot.as_ref() {
            return Err(LiveError::TrackerAlreadyRunning(active.config.event_id));
        }

        let stats = Arc::new(Mutex::new(PollStats::default()));
        let handle = tokio::spawn(poll_loop(
            self.pool.clone(),
            Arc::clone(&self.scraper),
            config.clone(),
            Arc::clone(&stats),
            Arc::clone(&self.active),
        ));

        info!(
            "live tracker started: event {} target {} every {}s",
            config.event_id, config.scrape_target, config.interval_secs
        );
        *slot = Some(ActiveTracking {
            config,
            started_at: Utc::now(),
            stats,
            handle,
        });
        Ok(())
    }

    /// Stops the active tracking. A no-op when nothing is running.
    pub async fn stop(&self) {
        let mut slot = self.active.lock().await;
        if let Some(active) = slot.take() {
            active.handle.abort();
            info!("live tracker stopped for event {}", active.config.event_id);
        }
    }

    pub async fn status(&self) -> TrackerStatus {
        let slot = self.active.lock().await;
        match slot.as_ref() {
            Some(active) => {
                let stats = active.stats.lock().await.clone();
                TrackerStatus {
                    is_running: true,
                    event_id: Some(active.config.event_id),
                    event_name: stats.event_name,
                    started_at: Some(active.started_at),
                    last_scrape_at: stats.last_scrape_at,
                    total_scrapes: stats.total_scrapes,
                    fights_updated: stats.fights_updated,
                    last_error: stats.last_error,
                }
            }
            None => TrackerStatus::idle(),
        }
    }
}

enum PollOutcome {
    Continue,
    EventComplete,
}

async fn poll_loop(
    pool: PgPool,
    scraper: Arc<dyn EventScraper>,
    config: TrackerConfig,
    stats: Arc<Mutex<PollStats>>,
    slot: TrackingSlot,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));

    loop {
        ticker.tick().await;
        match poll_once(&pool, scraper.as_ref(), &config, &stats).await {
            Ok(PollOutcome::Continue) => {}
            Ok(PollOutcome::EventComplete) => {
                info!(
                    "event {} reported complete by scraper, ending live tracking",
                    config.event_id
                );
                break;
            }
            // A manual-mode event must not be polled again; anything else is
            // transient and the next tick is the retry.
            Err(LiveError::ManualMode(event_id)) => {
                error!("event {} switched to manual mode, ending live tracking", event_id);
                break;
            }
            Err(e) => {
                warn!("poll failed for event {}: {}", config.event_id, e);
                stats.lock().await.last_error = Some(e.to_string());
            }
        }
    }

    // Release our own slot so status() reports idle; the scheduler's stop
    // path stays the fallback if this task is aborted instead.
    let mut guard = slot.lock().await;
    if guard
        .as_ref()
        .map(|active| active.config.event_id == config.event_id)
        .unwrap_or(false)
    {
        *guard = None;
    }
}

async fn poll_once(
    pool: &PgPool,
    scraper: &dyn EventScraper,
    config: &TrackerConfig,
    stats: &Mutex<PollStats>,
) -> Result<PollOutcome, LiveError> {
    stats.lock().await.total_scrapes += 1;

    let snapshot = match tokio::time::timeout(
        Duration::from_secs(SCRAPE_TIMEOUT_SECS),
        scraper.scrape(&config.scrape_target),
    )
    .await
    {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(LiveError::ScrapeTimeout(config.scrape_target.clone())),
    };
    stats.lock().await.last_scrape_at = Some(Utc::now());

    let event = store::get_event(pool, config.event_id)
        .await?
        .ok_or(LiveError::EventNotFound(config.event_id))?;
    if event.is_manual() {
        return Err(LiveError::ManualMode(event.id));
    }
    let fights = store::get_fights_for_event(pool, event.id).await?;

    {
        let mut s = stats.lock().await;
        s.event_name = Some(event.name.clone());
    }

    let mut updated = 0u64;
    for snap_fight in &snapshot.fights {
        let Some(fight) = matching::match_fight(
            &snap_fight.fighter_a_last_name,
            &snap_fight.fighter_b_last_name,
            &fights,
        ) else {
            // Data-shape mismatch: skip this pairing, keep applying the rest.
            warn!(
                "no stored fight matches '{}' vs '{}' on event {}",
                snap_fight.fighter_a_last_name, snap_fight.fighter_b_last_name, event.id
            );
            continue;
        };

        let Some(fight_delta) = delta::compute_fight_delta(fight, snap_fight) else {
            continue;
        };
        let completes = fight_delta.completes_fight();

        if store::apply_fight_delta(pool, fight, &fight_delta).await? {
            updated += 1;
            info!(
                "fight {} ({}) updated from snapshot{}",
                fight.id,
                fight.matchup(),
                if completes { ", now complete" } else { "" }
            );
            if completes {
                notifier::notify_next_fight(pool, &event, fight).await;
            }
        }
    }

    if updated > 0 {
        stats.lock().await.fights_updated += updated;
    }

    if let Some(event_delta) = delta::compute_event_delta(&event, &snapshot) {
        if store::apply_event_delta(pool, &event, &event_delta).await? {
            info!(
                "event {} ({}) moved to {}",
                event.id,
                event.name,
                event_delta.new_status.as_str()
            );
        }
    }

    if snapshot.event_complete {
        return Ok(PollOutcome::EventComplete);
    }
    Ok(PollOutcome::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scraper_client::{EventSnapshot, ScrapeError};
    use sqlx::postgres::PgPoolOptions;

    struct StubScraper;

    #[async_trait]
    impl EventScraper for StubScraper {
        async fn scrape(&self, _target: &str) -> Result<EventSnapshot, ScrapeError> {
            Ok(EventSnapshot::default())
        }
    }

    fn lazy_pool() -> PgPool {
        // Never actually connects; polls against it fail and are recorded
        // as last_error, which is exactly the isolation the tracker promises.
        PgPoolOptions::new()
            .connect_lazy("postgres://localhost:1/unreachable")
            .unwrap()
    }

    fn config(event_id: i64) -> TrackerConfig {
        TrackerConfig {
            event_id,
            scrape_target: "test-card".to_string(),
            interval_secs: 3600,
        }
    }

    #[tokio::test]
    async fn second_start_is_rejected_and_leaves_tracking_untouched() {
        let tracker = LiveTracker::new(lazy_pool(), Arc::new(StubScraper));
        tracker.start(config(7)).await.unwrap();

        let err = tracker.start(config(8)).await.unwrap_err();
        assert!(matches!(err, LiveError::TrackerAlreadyRunning(7)));

        let status = tracker.status().await;
        assert!(status.is_running);
        assert_eq!(status.event_id, Some(7));

        tracker.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let tracker = LiveTracker::new(lazy_pool(), Arc::new(StubScraper));
        tracker.stop().await;

        tracker.start(config(1)).await.unwrap();
        tracker.stop().await;
        tracker.stop().await;

        let status = tracker.status().await;
        assert!(!status.is_running);
        assert!(status.event_id.is_none());
    }

    #[tokio::test]
    async fn status_is_idle_before_any_start() {
        let tracker = LiveTracker::new(lazy_pool(), Arc::new(StubScraper));
        let status = tracker.status().await;
        assert!(!status.is_running);
        assert_eq!(status.total_scrapes, 0);
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn restart_after_stop_is_allowed() {
        let tracker = LiveTracker::new(lazy_pool(), Arc::new(StubScraper));
        tracker.start(config(1)).await.unwrap();
        tracker.stop().await;
        tracker.start(config(2)).await.unwrap();

        let status = tracker.status().await;
        assert_eq!(status.event_id, Some(2));
        tracker.stop().await;
    }
}
