use scraper_client::{EventSnapshot, FightSnapshot};

use crate::matching;
use crate::models::{EventRow, EventStatus, FightRow, FightStatus};

/// The field-scoped update a poll cycle wants to write for one fight.
/// Computed purely from current state plus the snapshot, so re-applying
/// the same snapshot yields no delta at all.
#[derive(Debug, Clone, PartialEq)]
pub struct FightDelta {
    pub fight_id: i64,
    pub new_status: Option<FightStatus>,
    pub winner_name: Option<String>,
    pub result_method: Option<String>,
    pub result_round: Option<i32>,
    pub result_time: Option<String>,
}

impl FightDelta {
    pub fn completes_fight(&self) -> bool {
        self.new_status == Some(FightStatus::Completed)
    }

    fn is_empty(&self) -> bool {
        self.new_status.is_none()
            && self.winner_name.is_none()
            && self.result_method.is_none()
            && self.result_round.is_none()
            && self.result_time.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDelta {
    pub new_status: EventStatus,
}

/// Diffs a stored fight against its scraped counterpart, keeping only the
/// strictly-forward transitions the state machine allows. Stale or partial
/// scraper data therefore cannot undo anything: a flag that is already set
/// stays set, a result field that is already populated is never rewritten.
pub fn compute_fight_delta(current: &FightRow, snapshot: &FightSnapshot) -> Option<FightDelta> {
    let status = current.status()?;
    if status == FightStatus::Cancelled {
        return None;
    }
    // A manually decided fight is off limits to the scraper path entirely.
    if current.is_manually_decided() {
        return None;
    }

    let new_status = if snapshot.complete && status.can_advance_to(FightStatus::Completed) {
        Some(FightStatus::Completed)
    } else if snapshot.started && status.can_advance_to(FightStatus::Live) {
        Some(FightStatus::Live)
    } else {
        None
    };

    let mut delta = FightDelta {
        fight_id: current.id,
        new_status,
        winner_name: None,
        result_method: None,
        result_round: None,
        result_time: None,
    };

    if let Some(result) = &snapshot.result {
        if current.winner_name.is_none() {
            delta.winner_name = result
                .winner_last_name
                .as_deref()
                .and_then(|last| matching::resolve_winner(current, last));
        }
        if current.result_method.is_none() {
            delta.result_method = result.method.clone();
        }
        if current.result_round.is_none() {
            delta.result_round = result.round;
        }
        if current.result_time.is_none() {
            delta.result_time = result.time.clone();
        }
    }

    if delta.is_empty() {
        None
    } else {
        Some(delta)
    }
}

/// Event-level counterpart. Completion dominates: a snapshot that reports
/// the event complete completes it even if we never saw it start.
pub fn compute_event_delta(current: &EventRow, snapshot: &EventSnapshot) -> Option<EventDelta> {
    let status = current.status()?;
    if snapshot.event_complete && status != EventStatus::Completed {
        return Some(EventDelta {
            new_status: EventStatus::Completed,
        });
    }
    if snapshot.event_started && status == EventStatus::Upcoming {
        return Some(EventDelta {
            new_status: EventStatus::Live,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_fixtures::{event, fight};
    use crate::models::METHOD_MANUAL;
    use scraper_client::SnapshotResult;

    fn snapshot_fight(started: bool, complete: bool) -> FightSnapshot {
        FightSnapshot {
            fighter_a_last_name: "Jones".to_string(),
            fighter_b_last_name: "Miocic".to_string(),
            started,
            complete,
            result: None,
        }
    }

    #[test]
    fn upcoming_fight_goes_live() {
        let f = fight(1, 10, 1, "Jones", "Miocic");
        let delta = compute_fight_delta(&f, &snapshot_fight(true, false)).unwrap();
        assert_eq!(delta.new_status, Some(FightStatus::Live));
        assert!(delta.winner_name.is_none());
    }

    #[test]
    fn complete_flag_wins_over_started() {
        let f = fight(1, 10, 1, "Jones", "Miocic");
        let delta = compute_fight_delta(&f, &snapshot_fight(true, true)).unwrap();
        assert_eq!(delta.new_status, Some(FightStatus::Completed));
    }

    #[test]
    fn reapplying_the_same_snapshot_is_a_no_op() {
        let mut f = fight(1, 10, 1, "Jones", "Miocic");
        let snap = FightSnapshot {
            result: Some(SnapshotResult {
                winner_last_name: Some("Jones".to_string()),
                method: Some("KO/TKO".to_string()),
                round: Some(2),
                time: Some("3:12".to_string()),
            }),
            ..snapshot_fight(true, true)
        };

        let delta = compute_fight_delta(&f, &snap).unwrap();
        assert_eq!(delta.new_status, Some(FightStatus::Completed));
        assert_eq!(delta.winner_name.as_deref(), Some("Alpha Jones"));
        assert_eq!(delta.result_method.as_deref(), Some("KO/TKO"));

        // Pretend the write landed, then diff again.
        f.status = "COMPLETED".to_string();
        f.winner_name = delta.winner_name.clone();
        f.result_method = delta.result_method.clone();
        f.result_round = delta.result_round;
        f.result_time = delta.result_time.clone();

        assert_eq!(compute_fight_delta(&f, &snap), None);
    }

    #[test]
    fn stale_snapshot_cannot_regress_a_live_fight() {
        let mut f = fight(1, 10, 1, "Jones", "Miocic");
        f.status = "LIVE".to_string();
        // Scraper briefly serves a stale page where nothing has started.
        assert_eq!(compute_fight_delta(&f, &snapshot_fight(false, false)), None);
    }

    #[test]
    fn cancelled_and_manual_fights_are_untouchable() {
        let mut cancelled = fight(1, 10, 1, "Jones", "Miocic");
        cancelled.status = "CANCELLED".to_string();
        assert_eq!(compute_fight_delta(&cancelled, &snapshot_fight(true, true)), None);

        let mut manual = fight(2, 10, 2, "Silva", "Adesanya");
        manual.status = "LIVE".to_string();
        manual.completion_method = Some(METHOD_MANUAL.to_string());
        let snap = FightSnapshot {
            fighter_a_last_name: "Silva".to_string(),
            fighter_b_last_name: "Adesanya".to_string(),
            ..snapshot_fight(true, true)
        };
        assert_eq!(compute_fight_delta(&manual, &snap), None);
    }

    #[test]
    fn populated_result_fields_are_never_rewritten() {
        let mut f = fight(1, 10, 1, "Jones", "Miocic");
        f.status = "COMPLETED".to_string();
        f.winner_name = Some("Alpha Jones".to_string());
        f.result_method = Some("Decision".to_string());

        let snap = FightSnapshot {
            result: Some(SnapshotResult {
                winner_last_name: Some("Miocic".to_string()),
                method: Some("KO/TKO".to_string()),
                round: Some(1),
                time: Some("0:45".to_string()),
            }),
            ..snapshot_fight(true, true)
        };

        let delta = compute_fight_delta(&f, &snap).unwrap();
        assert!(delta.winner_name.is_none());
        assert!(delta.result_method.is_none());
        assert_eq!(delta.result_round, Some(1));
        assert_eq!(delta.result_time.as_deref(), Some("0:45"));
    }

    #[test]
    fn unresolvable_winner_is_dropped_not_guessed() {
        let f = fight(1, 10, 1, "Jones", "Miocic");
        let snap = FightSnapshot {
            result: Some(SnapshotResult {
                winner_last_name: Some("Ngannou".to_string()),
                method: None,
                round: None,
                time: None,
            }),
            ..snapshot_fight(true, true)
        };
        let delta = compute_fight_delta(&f, &snap).unwrap();
        assert_eq!(delta.new_status, Some(FightStatus::Completed));
        assert!(delta.winner_name.is_none());
    }

    #[test]
    fn event_delta_moves_forward_only() {
        let mut e = event(1);
        let mut snap = EventSnapshot::default();
        assert_eq!(compute_event_delta(&e, &snap), None);

        snap.event_started = true;
        assert_eq!(
            compute_event_delta(&e, &snap).map(|d| d.new_status),
            Some(EventStatus::Live)
        );

        e.status = "LIVE".to_string();
        assert_eq!(compute_event_delta(&e, &snap), None);

        snap.event_complete = true;
        assert_eq!(
            compute_event_delta(&e, &snap).map(|d| d.new_status),
            Some(EventStatus::Completed)
        );

        e.status = "COMPLETED".to_string();
        assert_eq!(compute_event_delta(&e, &snap), None);
    }

    #[test]
    fn completion_applies_even_without_a_seen_start() {
        let e = event(1);
        let snap = EventSnapshot {
            event_started: false,
            event_complete: true,
            fights: Vec::new(),
        };
        assert_eq!(
            compute_event_delta(&e, &snap).map(|d| d.new_status),
            Some(EventStatus::Completed)
        );
    }
}
