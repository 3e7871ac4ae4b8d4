use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const METHOD_SCRAPER: &str = "scraper";
pub const METHOD_FAILSAFE_TIMEOUT: &str = "failsafe-timeout";
pub const METHOD_FAILSAFE_FORCE_TIMEOUT: &str = "failsafe-force-timeout";
pub const METHOD_ALL_FIGHTS_COMPLETE: &str = "all-fights-complete";
pub const METHOD_MANUAL: &str = "manual";

pub const TRACKER_MODE_MANUAL: &str = "MANUAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Upcoming,
    Live,
    Completed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "UPCOMING",
            EventStatus::Live => "LIVE",
            EventStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(value: &str) -> Option<EventStatus> {
        match value {
            "UPCOMING" => Some(EventStatus::Upcoming),
            "LIVE" => Some(EventStatus::Live),
            "COMPLETED" => Some(EventStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FightStatus {
    Upcoming,
    Live,
    Completed,
    Cancelled,
}

impl FightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FightStatus::Upcoming => "UPCOMING",
            FightStatus::Live => "LIVE",
            FightStatus::Completed => "COMPLETED",
            FightStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<FightStatus> {
        match value {
            "UPCOMING" => Some(FightStatus::Upcoming),
            "LIVE" => Some(FightStatus::Live),
            "COMPLETED" => Some(FightStatus::Completed),
            "CANCELLED" => Some(FightStatus::Cancelled),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            FightStatus::Upcoming => 0,
            FightStatus::Live => 1,
            FightStatus::Completed | FightStatus::Cancelled => 2,
        }
    }

    /// Automatic writers only ever move forward: UPCOMING -> LIVE ->
    /// COMPLETED, with CANCELLED reachable from any non-terminal state.
    pub fn can_advance_to(&self, next: FightStatus) -> bool {
        match next {
            FightStatus::Upcoming => false,
            FightStatus::Live => *self == FightStatus::Upcoming,
            FightStatus::Completed => {
                *self == FightStatus::Upcoming || *self == FightStatus::Live
            }
            FightStatus::Cancelled => {
                *self == FightStatus::Upcoming || *self == FightStatus::Live
            }
        }
    }

    /// True when `next` would move a record backwards. Manual overrides are
    /// allowed to do this, but the write must clear completion provenance.
    pub fn is_regression_to(&self, next: FightStatus) -> bool {
        next.rank() < self.rank()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, FromRow)]
pub struct EventRow {
    pub id: i64,
    pub name: String,
    pub promotion: String,
    pub event_date: DateTime<Utc>,
    pub early_prelim_start: Option<DateTime<Utc>>,
    pub prelim_start: Option<DateTime<Utc>>,
    pub main_card_start: Option<DateTime<Utc>>,
    pub status: String,
    pub tracker_mode: Option<String>,
    pub completion_method: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub scrape_target: Option<String>,
}

impl EventRow {
    pub fn status(&self) -> Option<EventStatus> {
        EventStatus::parse(&self.status)
    }

    pub fn is_completed(&self) -> bool {
        self.status() == Some(EventStatus::Completed)
    }

    pub fn is_manual(&self) -> bool {
        self.tracker_mode.as_deref() == Some(TRACKER_MODE_MANUAL)
    }

    /// The calendar date alone is midnight and useless for timing; the real
    /// start instant is the earliest sub-card start that was announced.
    pub fn effective_start_time(&self) -> DateTime<Utc> {
        [
            self.early_prelim_start,
            self.prelim_start,
            self.main_card_start,
        ]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(self.event_date)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, FromRow)]
pub struct FightRow {
    pub id: i64,
    pub event_id: i64,
    pub fighter1_first_name: String,
    pub fighter1_last_name: String,
    pub fighter2_first_name: String,
    pub fighter2_last_name: String,
    pub order_on_card: i32,
    pub status: String,
    pub winner_name: Option<String>,
    pub result_method: Option<String>,
    pub result_round: Option<i32>,
    pub result_time: Option<String>,
    pub completion_method: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl FightRow {
    pub fn status(&self) -> Option<FightStatus> {
        FightStatus::parse(&self.status)
    }

    pub fn is_manually_decided(&self) -> bool {
        self.completion_method.as_deref() == Some(METHOD_MANUAL)
    }

    pub fn fighter1_name(&self) -> String {
        format!("{} {}", self.fighter1_first_name, self.fighter1_last_name)
    }

    pub fn fighter2_name(&self) -> String {
        format!("{} {}", self.fighter2_first_name, self.fighter2_last_name)
    }

    pub fn matchup(&self) -> String {
        format!("{} vs {}", self.fighter1_name(), self.fighter2_name())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fight_status_round_trips_through_strings() {
        for status in [
            FightStatus::Upcoming,
            FightStatus::Live,
            FightStatus::Completed,
            FightStatus::Cancelled,
        ] {
            assert_eq!(FightStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(FightStatus::parse("POSTPONED"), None);
    }

    #[test]
    fn transitions_only_move_forward() {
        assert!(FightStatus::Upcoming.can_advance_to(FightStatus::Live));
        assert!(FightStatus::Upcoming.can_advance_to(FightStatus::Completed));
        assert!(FightStatus::Live.can_advance_to(FightStatus::Completed));
        assert!(FightStatus::Live.can_advance_to(FightStatus::Cancelled));

        assert!(!FightStatus::Live.can_advance_to(FightStatus::Upcoming));
        assert!(!FightStatus::Completed.can_advance_to(FightStatus::Live));
        assert!(!FightStatus::Completed.can_advance_to(FightStatus::Upcoming));
        assert!(!FightStatus::Cancelled.can_advance_to(FightStatus::Completed));
        assert!(!FightStatus::Completed.can_advance_to(FightStatus::Completed));
    }

    #[test]
    fn regression_detection_matches_rank_order() {
        assert!(FightStatus::Completed.is_regression_to(FightStatus::Upcoming));
        assert!(FightStatus::Completed.is_regression_to(FightStatus::Live));
        assert!(FightStatus::Live.is_regression_to(FightStatus::Upcoming));
        assert!(!FightStatus::Upcoming.is_regression_to(FightStatus::Live));
        assert!(!FightStatus::Completed.is_regression_to(FightStatus::Cancelled));
    }

    #[test]
    fn effective_start_prefers_earliest_sub_card() {
        let mut event = test_fixtures::event(1);
        assert_eq!(event.effective_start_time(), event.event_date);

        event.main_card_start = Some(Utc.with_ymd_and_hms(2026, 8, 16, 3, 0, 0).unwrap());
        assert_eq!(event.effective_start_time(), event.main_card_start.unwrap());

        event.prelim_start = Some(Utc.with_ymd_and_hms(2026, 8, 16, 1, 0, 0).unwrap());
        event.early_prelim_start = Some(Utc.with_ymd_and_hms(2026, 8, 15, 23, 30, 0).unwrap());
        assert_eq!(
            event.effective_start_time(),
            event.early_prelim_start.unwrap()
        );
    }

    #[test]
    fn manual_mode_is_detected() {
        let mut event = test_fixtures::event(1);
        assert!(!event.is_manual());
        event.tracker_mode = Some("TIME_BASED".to_string());
        assert!(!event.is_manual());
        event.tracker_mode = Some("MANUAL".to_string());
        assert!(event.is_manual());
    }
}
