use chrono::Utc;
use log::{debug, error, info, warn};
use redis_client::RedisManager;
use serde::Serialize;
use sqlx::PgPool;

use crate::models::{EventRow, FightRow};
use crate::store;

const FIGHT_NOTIFICATIONS_STREAM: &str = "fight_notifications";

#[derive(Debug, Serialize)]
pub struct NextFightNotification {
    pub event_id: i64,
    pub event_name: String,
    pub completed_fight_id: i64,
    pub completed_fight_order: i32,
    pub next_fight_id: i64,
    pub next_fight_order: i32,
    pub next_matchup: String,
    pub timestamp: String,
}

pub fn build_notification(
    event: &EventRow,
    completed: &FightRow,
    next: &FightRow,
) -> NextFightNotification {
    NextFightNotification {
        event_id: event.id,
        event_name: event.name.clone(),
        completed_fight_id: completed.id,
        completed_fight_order: completed.order_on_card,
        next_fight_id: next.id,
        next_fight_order: next.order_on_card,
        next_matchup: next.matchup(),
        timestamp: Utc::now().to_rfc3339(),
    }
}

/// Fire-and-forget "notify next fight" side effect, published after a fight
/// transitions into COMPLETED. Every failure path logs and returns; nothing
/// here may block or fail the tracker's write path.
pub async fn notify_next_fight(pool: &PgPool, event: &EventRow, completed: &FightRow) {
    let next = match store::next_upcoming_fight(pool, event.id, completed.order_on_card).await {
        Ok(Some(next)) => next,
        Ok(None) => {
            debug!(
                "fight {} completed with no upcoming fight below order {}",
                completed.id, completed.order_on_card
            );
            return;
        }
        Err(e) => {
            warn!(
                "could not resolve next fight after fight {}: {}",
                completed.id, e
            );
            return;
        }
    };

    let Some(redis_manager) = RedisManager::global() else {
        warn!("Redis manager not initialized, skipping next-fight notification");
        return;
    };

    let notification = build_notification(event, completed, &next);
    let payload = match serde_json::to_string(&notification) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize next-fight notification: {}", e);
            return;
        }
    };

    match redis_manager
        .stream_add(FIGHT_NOTIFICATIONS_STREAM, &[("data", &payload)])
        .await
    {
        Ok(_) => info!(
            "published next-fight notification: event {} fight {} -> fight {}",
            event.id, completed.id, next.id
        ),
        Err(e) => error!("Failed to publish next-fight notification: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_fixtures::{event, fight};

    #[test]
    fn notification_carries_both_fight_orders() {
        let ev = event(10);
        let completed = fight(3, 10, 3, "Silva", "Jones");
        let next = fight(2, 10, 2, "Ngannou", "Gane");

        let n = build_notification(&ev, &completed, &next);
        assert_eq!(n.event_id, 10);
        assert_eq!(n.completed_fight_id, 3);
        assert_eq!(n.completed_fight_order, 3);
        assert_eq!(n.next_fight_id, 2);
        assert_eq!(n.next_fight_order, 2);
        assert_eq!(n.next_matchup, "Alpha Ngannou vs Bravo Gane");
    }
}
