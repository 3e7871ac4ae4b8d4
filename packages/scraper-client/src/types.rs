use serde::{Deserialize, Serialize};

/// Normalized, promotion-agnostic view of a live fight card. Scrapers must
/// tolerate partial pages, so every field defaults when absent.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EventSnapshot {
    #[serde(default)]
    pub event_started: bool,
    #[serde(default)]
    pub event_complete: bool,
    #[serde(default)]
    pub fights: Vec<FightSnapshot>,
}

/// One bout as seen on the target site. External sources do not share our
/// ids, so fights are identified by the fighter last-name pairing.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FightSnapshot {
    #[serde(default)]
    pub fighter_a_last_name: String,
    #[serde(default)]
    pub fighter_b_last_name: String,
    #[serde(default)]
    pub started: bool,
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub result: Option<SnapshotResult>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SnapshotResult {
    #[serde(default)]
    pub winner_last_name: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub round: Option<i32>,
    #[serde(default)]
    pub time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_parses_with_missing_fields() {
        let snapshot: EventSnapshot = serde_json::from_str(
            r#"{"event_started": true, "fights": [{"fighter_a_last_name": "Silva"}]}"#,
        )
        .unwrap();

        assert!(snapshot.event_started);
        assert!(!snapshot.event_complete);
        assert_eq!(snapshot.fights.len(), 1);
        assert_eq!(snapshot.fights[0].fighter_a_last_name, "Silva");
        assert!(!snapshot.fights[0].started);
        assert!(snapshot.fights[0].result.is_none());
    }

    #[test]
    fn result_parses_with_partial_fields() {
        let result: SnapshotResult =
            serde_json::from_str(r#"{"winner_last_name": "Jones"}"#).unwrap();
        assert_eq!(result.winner_last_name.as_deref(), Some("Jones"));
        assert!(result.method.is_none());
        assert!(result.round.is_none());
    }
}
