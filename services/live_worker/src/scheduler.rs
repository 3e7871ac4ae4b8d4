use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, error, info};
use scraper_client::resolve_scrape_target;
use sqlx::PgPool;
use std::time::Duration;

use crate::error::LiveError;
use crate::models::EventRow;
use crate::store;
use crate::tracker::{LiveTracker, TrackerConfig};

pub const SCHEDULER_TICK_SECS: u64 = 300;

/// Tracking begins up to this long before the effective start, to catch
/// cards that go live early.
pub const START_BUFFER_MINUTES: i64 = 15;

/// And keeps considering events whose start is up to this long in the past,
/// so a worker restart mid-event resumes tracking.
pub const LOOKBACK_HOURS: i64 = 12;

/// Fixed-tick loop deciding when live tracking starts and stops. Tick
/// failures are logged and swallowed; the next tick is the retry.
pub async fn run_live_scheduler(pool: PgPool) {
    info!(
        "live scheduler running, tick every {}s",
        SCHEDULER_TICK_SECS
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(SCHEDULER_TICK_SECS));
    loop {
        ticker.tick().await;
        if let Err(e) = scheduler_tick(&pool).await {
            error!("live scheduler tick failed: {}", e);
        }
    }
}

async fn scheduler_tick(pool: &PgPool) -> Result<(), LiveError> {
    let tracker = LiveTracker::global().ok_or(LiveError::TrackerNotInitialized)?;

    // Only one event is tracked at a time. While a tracking is active the
    // only scheduler decision is whether its event has finished.
    let status = tracker.status().await;
    if status.is_running {
        if let Some(event_id) = status.event_id {
            match store::get_event(pool, event_id).await? {
                Some(event) if event.is_completed() => {
                    info!("event {} is completed, stopping live tracker", event_id);
                    tracker.stop().await;
                }
                Some(_) => debug!("live tracker still busy with event {}", event_id),
                None => {
                    error!("tracked event {} no longer exists, stopping tracker", event_id);
                    tracker.stop().await;
                }
            }
        }
        return Ok(());
    }

    let candidates = store::find_candidate_events(pool).await?;
    let Some(event) = pick_candidate(&candidates, Utc::now()) else {
        debug!("no event due for live tracking");
        return Ok(());
    };

    let target = event
        .scrape_target
        .clone()
        .unwrap_or_else(|| resolve_scrape_target(&event.promotion, &event.name, event.event_date));

    let config = TrackerConfig {
        event_id: event.id,
        scrape_target: target,
        interval_secs: poll_interval_secs(&event.promotion),
    };
    info!(
        "starting live tracker for event {} ({})",
        event.id, event.name
    );
    tracker.start(config).await?;
    Ok(())
}

/// Pure candidate selection: automatic, not completed, effective start
/// inside `[now - 12h, now + 15m]`, earliest effective start first.
pub fn pick_candidate<'a>(events: &'a [EventRow], now: DateTime<Utc>) -> Option<&'a EventRow> {
    let window_start = now - ChronoDuration::hours(LOOKBACK_HOURS);
    let window_end = now + ChronoDuration::minutes(START_BUFFER_MINUTES);

    events
        .iter()
        .filter(|e| !e.is_manual() && !e.is_completed())
        .filter(|e| {
            let start = e.effective_start_time();
            start >= window_start && start <= window_end
        })
        .min_by_key(|e| e.effective_start_time())
}

/// Poll cadence by promotion: the flagship cards move fast enough to
/// justify the tighter interval.
pub fn poll_interval_secs(promotion: &str) -> u64 {
    if promotion.eq_ignore_ascii_case("UFC") {
        30
    } else {
        60
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_fixtures::event;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 15, 20, 0, 0).unwrap()
    }

    #[test]
    fn picks_nothing_when_no_event_is_near() {
        let mut e = event(1);
        e.main_card_start = Some(now() + ChronoDuration::hours(2));
        assert!(pick_candidate(&[e], now()).is_none());
    }

    #[test]
    fn picks_event_inside_the_start_buffer() {
        let mut e = event(1);
        e.main_card_start = Some(now() + ChronoDuration::minutes(10));
        assert_eq!(pick_candidate(&[e], now()).map(|e| e.id), Some(1));
    }

    #[test]
    fn picks_recently_started_event_after_restart() {
        let mut e = event(1);
        e.prelim_start = Some(now() - ChronoDuration::hours(11));
        assert_eq!(pick_candidate(&[e.clone()], now()).map(|e| e.id), Some(1));

        e.prelim_start = Some(now() - ChronoDuration::hours(13));
        assert!(pick_candidate(&[e.clone()], now()).is_none());
    }

    #[test]
    fn prefers_the_earliest_effective_start() {
        let mut early = event(1);
        early.main_card_start = Some(now() - ChronoDuration::hours(1));
        let mut late = event(2);
        late.main_card_start = Some(now() - ChronoDuration::minutes(5));

        let events = vec![late, early];
        assert_eq!(pick_candidate(&events, now()).map(|e| e.id), Some(1));
    }

    #[test]
    fn manual_and_completed_events_are_excluded() {
        let mut manual = event(1);
        manual.main_card_start = Some(now());
        manual.tracker_mode = Some("MANUAL".to_string());

        let mut done = event(2);
        done.main_card_start = Some(now());
        done.status = "COMPLETED".to_string();

        assert!(pick_candidate(&[manual, done], now()).is_none());
    }

    #[test]
    fn calendar_date_fallback_applies_when_no_sub_card_times() {
        // No sub-card times announced: the midnight calendar date is the
        // effective start, so the event is picked up until noon.
        let e = event(1);
        let morning = Utc.with_ymd_and_hms(2026, 8, 15, 9, 0, 0).unwrap();
        assert_eq!(pick_candidate(&[e.clone()], morning).map(|e| e.id), Some(1));

        let evening = Utc.with_ymd_and_hms(2026, 8, 15, 20, 0, 0).unwrap();
        assert!(pick_candidate(&[e], evening).is_none());
    }

    #[test]
    fn poll_interval_is_promotion_appropriate() {
        assert_eq!(poll_interval_secs("UFC"), 30);
        assert_eq!(poll_interval_secs("ufc"), 30);
        assert_eq!(poll_interval_secs("ONE"), 60);
    }
}
