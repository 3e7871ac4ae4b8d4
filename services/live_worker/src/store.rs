use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::delta::{EventDelta, FightDelta};
use crate::models::{
    EventRow, EventStatus, FightRow, FightStatus, METHOD_MANUAL, METHOD_SCRAPER,
};

const EVENT_COLUMNS: &str = "id, name, promotion, event_date, early_prelim_start, prelim_start, \
     main_card_start, status, tracker_mode, completion_method, completed_at, scrape_target";

const FIGHT_COLUMNS: &str = "id, event_id, fighter1_first_name, fighter1_last_name, \
     fighter2_first_name, fighter2_last_name, order_on_card, status, winner_name, \
     result_method, result_round, result_time, completion_method, completed_at";

/// Effective start instant, computed in SQL the same way
/// `EventRow::effective_start_time` computes it in Rust. Postgres LEAST
/// skips NULL arguments, so this is the earliest announced sub-card start,
/// falling back to the calendar date.
const EFFECTIVE_START_SQL: &str =
    "COALESCE(LEAST(e.early_prelim_start, e.prelim_start, e.main_card_start), e.event_date)";

const NOT_MANUAL_SQL: &str = "(e.tracker_mode IS NULL OR e.tracker_mode <> 'MANUAL')";

pub async fn get_event(pool: &PgPool, event_id: i64) -> Result<Option<EventRow>, sqlx::Error> {
    sqlx::query_as::<_, EventRow>(&format!(
        "SELECT {} FROM events WHERE id = $1",
        EVENT_COLUMNS
    ))
    .bind(event_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_fights_for_event(
    pool: &PgPool,
    event_id: i64,
) -> Result<Vec<FightRow>, sqlx::Error> {
    sqlx::query_as::<_, FightRow>(&format!(
        "SELECT {} FROM fights WHERE event_id = $1 ORDER BY order_on_card ASC",
        FIGHT_COLUMNS
    ))
    .bind(event_id)
    .fetch_all(pool)
    .await
}

/// Coarse pre-filter for the scheduler: automatic, not completed, and dated
/// near now. The precise effective-start window check happens in
/// `scheduler::pick_candidate`, which is pure and unit-tested.
pub async fn find_candidate_events(pool: &PgPool) -> Result<Vec<EventRow>, sqlx::Error> {
    sqlx::query_as::<_, EventRow>(&format!(
        "SELECT {cols} FROM events e \
         WHERE e.status <> 'COMPLETED' \
           AND {not_manual} \
           AND e.event_date BETWEEN now() - interval '2 days' AND now() + interval '1 day' \
         ORDER BY e.event_date ASC",
        cols = EVENT_COLUMNS,
        not_manual = NOT_MANUAL_SQL,
    ))
    .fetch_all(pool)
    .await
}

/// Applies a computed fight delta as a single field-scoped UPDATE. The
/// WHERE clause restates the status the delta was computed against and
/// refuses manually decided rows, so a racing writer makes this a no-op
/// instead of a lost update. Returns whether a row actually changed.
pub async fn apply_fight_delta(
    pool: &PgPool,
    current: &FightRow,
    delta: &FightDelta,
) -> Result<bool, sqlx::Error> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE fights SET ");
    {
        let mut set = qb.separated(", ");
        if let Some(status) = delta.new_status {
            set.push("status = ");
            set.push_bind_unseparated(status.as_str());
            if status == FightStatus::Completed {
                set.push("completion_method = ");
                set.push_bind_unseparated(METHOD_SCRAPER);
                set.push("completed_at = ");
                set.push_bind_unseparated(Utc::now());
            }
        }
        if let Some(winner) = &delta.winner_name {
            set.push("winner_name = ");
            set.push_bind_unseparated(winner.clone());
        }
        if let Some(method) = &delta.result_method {
            set.push("result_method = ");
            set.push_bind_unseparated(method.clone());
        }
        if let Some(round) = delta.result_round {
            set.push("result_round = ");
            set.push_bind_unseparated(round);
        }
        if let Some(time) = &delta.result_time {
            set.push("result_time = ");
            set.push_bind_unseparated(time.clone());
        }
    }

    qb.push(" WHERE id = ");
    qb.push_bind(delta.fight_id);
    qb.push(" AND status = ");
    qb.push_bind(current.status.clone());
    qb.push(" AND completion_method IS DISTINCT FROM ");
    qb.push_bind(METHOD_MANUAL);

    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn apply_event_delta(
    pool: &PgPool,
    current: &EventRow,
    delta: &EventDelta,
) -> Result<bool, sqlx::Error> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE events SET status = ");
    qb.push_bind(delta.new_status.as_str());
    if delta.new_status == EventStatus::Completed {
        qb.push(", completion_method = ");
        qb.push_bind(METHOD_SCRAPER);
        qb.push(", completed_at = ");
        qb.push_bind(Utc::now());
    }
    qb.push(" WHERE id = ");
    qb.push_bind(current.id);
    qb.push(" AND status = ");
    qb.push_bind(current.status.clone());
    qb.push(" AND completion_method IS DISTINCT FROM ");
    qb.push_bind(METHOD_MANUAL);

    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// The fight with the next-lower card order that has not started yet, i.e.
/// the one expected in the cage after `below_order` finishes.
pub async fn next_upcoming_fight(
    pool: &PgPool,
    event_id: i64,
    below_order: i32,
) -> Result<Option<FightRow>, sqlx::Error> {
    sqlx::query_as::<_, FightRow>(&format!(
        "SELECT {} FROM fights \
         WHERE event_id = $1 AND order_on_card < $2 AND status = 'UPCOMING' \
         ORDER BY order_on_card DESC LIMIT 1",
        FIGHT_COLUMNS
    ))
    .bind(event_id)
    .bind(below_order)
    .fetch_optional(pool)
    .await
}

/// Reconciler pass 1 input: fights still LIVE on automatic events whose
/// effective start is at or before `cutoff`.
pub async fn stuck_live_fights(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<Vec<FightRow>, sqlx::Error> {
    sqlx::query_as::<_, FightRow>(&format!(
        "SELECT f.id, f.event_id, f.fighter1_first_name, f.fighter1_last_name, \
                f.fighter2_first_name, f.fighter2_last_name, f.order_on_card, f.status, \
                f.winner_name, f.result_method, f.result_round, f.result_time, \
                f.completion_method, f.completed_at \
         FROM fights f JOIN events e ON e.id = f.event_id \
         WHERE f.status = 'LIVE' \
           AND f.completion_method IS DISTINCT FROM 'manual' \
           AND {not_manual} \
           AND {effective_start} <= $1",
        not_manual = NOT_MANUAL_SQL,
        effective_start = EFFECTIVE_START_SQL,
    ))
    .bind(cutoff)
    .fetch_all(pool)
    .await
}

/// Reconciler pass 2 input: LIVE automatic events where no fight is still
/// pending (every child is COMPLETED or CANCELLED, or the card is empty).
pub async fn live_events_with_all_fights_done(
    pool: &PgPool,
) -> Result<Vec<EventRow>, sqlx::Error> {
    sqlx::query_as::<_, EventRow>(&format!(
        "SELECT {cols} FROM events e \
         WHERE e.status = 'LIVE' \
           AND {not_manual} \
           AND NOT EXISTS (\
               SELECT 1 FROM fights f \
               WHERE f.event_id = e.id AND f.status NOT IN ('COMPLETED', 'CANCELLED'))",
        cols = EVENT_COLUMNS,
        not_manual = NOT_MANUAL_SQL,
    ))
    .fetch_all(pool)
    .await
}

/// Reconciler pass 3 input: LIVE automatic events whose effective start is
/// at or before `cutoff`.
pub async fn timed_out_live_events(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<Vec<EventRow>, sqlx::Error> {
    sqlx::query_as::<_, EventRow>(&format!(
        "SELECT {cols} FROM events e \
         WHERE e.status = 'LIVE' \
           AND {not_manual} \
           AND {effective_start} <= $1",
        cols = EVENT_COLUMNS,
        not_manual = NOT_MANUAL_SQL,
        effective_start = EFFECTIVE_START_SQL,
    ))
    .bind(cutoff)
    .fetch_all(pool)
    .await
}

pub async fn incomplete_fights(
    pool: &PgPool,
    event_id: i64,
) -> Result<Vec<FightRow>, sqlx::Error> {
    sqlx::query_as::<_, FightRow>(&format!(
        "SELECT {} FROM fights \
         WHERE event_id = $1 AND status NOT IN ('COMPLETED', 'CANCELLED') \
         ORDER BY order_on_card ASC",
        FIGHT_COLUMNS
    ))
    .bind(event_id)
    .fetch_all(pool)
    .await
}

/// Failsafe completion of one fight. Idempotent: the guard means a fight
/// already completed (or manually decided) is simply skipped, whichever
/// writer got there first.
pub async fn force_complete_fight(
    pool: &PgPool,
    fight_id: i64,
    provenance: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE fights \
         SET status = 'COMPLETED', completion_method = $2, completed_at = now() \
         WHERE id = $1 AND status NOT IN ('COMPLETED', 'CANCELLED') \
           AND completion_method IS DISTINCT FROM 'manual'",
    )
    .bind(fight_id)
    .bind(provenance)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn complete_event(
    pool: &PgPool,
    event_id: i64,
    provenance: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE events \
         SET status = 'COMPLETED', completion_method = $2, completed_at = now() \
         WHERE id = $1 AND status <> 'COMPLETED' \
           AND completion_method IS DISTINCT FROM 'manual'",
    )
    .bind(event_id)
    .bind(provenance)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcilerHealth {
    pub stuck_fights: i64,
    pub incomplete_events: i64,
    pub oldest_stuck_fight: Option<DateTime<Utc>>,
    pub oldest_incomplete_event: Option<DateTime<Utc>>,
}

/// Read-only view of what the failsafe passes would currently act on.
pub async fn reconciler_health(
    pool: &PgPool,
    fight_cutoff: DateTime<Utc>,
) -> Result<ReconcilerHealth, sqlx::Error> {
    let stuck_fights: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM fights f JOIN events e ON e.id = f.event_id \
         WHERE f.status = 'LIVE' \
           AND f.completion_method IS DISTINCT FROM 'manual' \
           AND {not_manual} \
           AND {effective_start} <= $1",
        not_manual = NOT_MANUAL_SQL,
        effective_start = EFFECTIVE_START_SQL,
    ))
    .bind(fight_cutoff)
    .fetch_one(pool)
    .await?;

    let oldest_stuck_fight: Option<DateTime<Utc>> = sqlx::query_scalar(&format!(
        "SELECT MIN({effective_start}) \
         FROM fights f JOIN events e ON e.id = f.event_id \
         WHERE f.status = 'LIVE' \
           AND f.completion_method IS DISTINCT FROM 'manual' \
           AND {not_manual}",
        not_manual = NOT_MANUAL_SQL,
        effective_start = EFFECTIVE_START_SQL,
    ))
    .fetch_one(pool)
    .await?;

    let incomplete_events: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM events e \
         WHERE e.status = 'LIVE' AND {not_manual}",
        not_manual = NOT_MANUAL_SQL,
    ))
    .fetch_one(pool)
    .await?;

    let oldest_incomplete_event: Option<DateTime<Utc>> = sqlx::query_scalar(&format!(
        "SELECT MIN({effective_start}) FROM events e \
         WHERE e.status = 'LIVE' AND {not_manual}",
        not_manual = NOT_MANUAL_SQL,
        effective_start = EFFECTIVE_START_SQL,
    ))
    .fetch_one(pool)
    .await?;

    Ok(ReconcilerHealth {
        stuck_fights,
        incomplete_events,
        oldest_stuck_fight,
        oldest_incomplete_event,
    })
}

/// Admin override write for a fight. This is the binding half of the
/// precedence policy: every manual write stamps `manual` provenance, and a
/// backward reset clears provenance, completion time and result fields so
/// the record re-enters the automatic lifecycle instead of being
/// immediately re-completed by the failsafe.
pub async fn manual_set_fight_status(
    pool: &PgPool,
    fight_id: i64,
    new_status: FightStatus,
) -> Result<bool, sqlx::Error> {
    let current = sqlx::query_as::<_, FightRow>(&format!(
        "SELECT {} FROM fights WHERE id = $1",
        FIGHT_COLUMNS
    ))
    .bind(fight_id)
    .fetch_optional(pool)
    .await?;

    let Some(current) = current else {
        return Ok(false);
    };
    let regression = current
        .status()
        .map(|s| s.is_regression_to(new_status))
        .unwrap_or(false);

    let result = if regression {
        sqlx::query(
            "UPDATE fights \
             SET status = $2, completion_method = NULL, completed_at = NULL, \
                 winner_name = NULL, result_method = NULL, result_round = NULL, \
                 result_time = NULL \
             WHERE id = $1",
        )
        .bind(fight_id)
        .bind(new_status.as_str())
        .execute(pool)
        .await?
    } else {
        sqlx::query(
            "UPDATE fights \
             SET status = $2, completion_method = $3, \
                 completed_at = CASE WHEN $2 = 'COMPLETED' THEN now() ELSE completed_at END \
             WHERE id = $1",
        )
        .bind(fight_id)
        .bind(new_status.as_str())
        .bind(METHOD_MANUAL)
        .execute(pool)
        .await?
    };

    info!(
        "manual status write: fight {} -> {}{}",
        fight_id,
        new_status.as_str(),
        if regression { " (reset, provenance cleared)" } else { "" }
    );
    Ok(result.rows_affected() > 0)
}

/// Admin override write for an event; same provenance contract as fights.
pub async fn manual_set_event_status(
    pool: &PgPool,
    event_id: i64,
    new_status: EventStatus,
) -> Result<bool, sqlx::Error> {
    let current = get_event(pool, event_id).await?;
    let Some(current) = current else {
        return Ok(false);
    };
    let regression = matches!(
        (current.status(), new_status),
        (Some(EventStatus::Completed), EventStatus::Live)
            | (Some(EventStatus::Completed), EventStatus::Upcoming)
            | (Some(EventStatus::Live), EventStatus::Upcoming)
    );

    let result = if regression {
        sqlx::query(
            "UPDATE events \
             SET status = $2, completion_method = NULL, completed_at = NULL \
             WHERE id = $1",
        )
        .bind(event_id)
        .bind(new_status.as_str())
        .execute(pool)
        .await?
    } else {
        sqlx::query(
            "UPDATE events \
             SET status = $2, completion_method = $3, \
                 completed_at = CASE WHEN $2 = 'COMPLETED' THEN now() ELSE completed_at END \
             WHERE id = $1",
        )
        .bind(event_id)
        .bind(new_status.as_str())
        .bind(METHOD_MANUAL)
        .execute(pool)
        .await?
    };

    info!(
        "manual status write: event {} -> {}{}",
        event_id,
        new_status.as_str(),
        if regression { " (reset, provenance cleared)" } else { "" }
    );
    Ok(result.rows_affected() > 0)
}
