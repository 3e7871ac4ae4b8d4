use crate::models::FightRow;

/// Finds the stored fight for a scraped fighter pairing. External sources
/// do not carry our ids, so matching is by last name, in either corner
/// order. An exact (case-insensitive) pass runs first; the substring
/// fallback preserves the tolerance the scrapers have always relied on for
/// hyphenated and accented renderings.
///
/// Known limitation: the substring fallback can pair "Silva" with
/// "Da Silva" when both appear on one card. Kept as observed behavior
/// pending product clarification; swap the heuristic here, not in the
/// tracker.
pub fn match_fight<'a>(
    last_a: &str,
    last_b: &str,
    fights: &'a [FightRow],
) -> Option<&'a FightRow> {
    if last_a.is_empty() || last_b.is_empty() {
        return None;
    }

    fights
        .iter()
        .find(|f| {
            pair_matches(last_a, last_b, &f.fighter1_last_name, &f.fighter2_last_name, exact)
        })
        .or_else(|| {
            fights.iter().find(|f| {
                pair_matches(
                    last_a,
                    last_b,
                    &f.fighter1_last_name,
                    &f.fighter2_last_name,
                    partial,
                )
            })
        })
}

/// Resolves a scraped winner last name against the two stored corners,
/// returning the stored fighter's full name. Same exact-then-partial order
/// as fight matching.
pub fn resolve_winner(fight: &FightRow, winner_last_name: &str) -> Option<String> {
    if winner_last_name.is_empty() {
        return None;
    }
    if exact(&fight.fighter1_last_name, winner_last_name) {
        return Some(fight.fighter1_name());
    }
    if exact(&fight.fighter2_last_name, winner_last_name) {
        return Some(fight.fighter2_name());
    }
    if partial(&fight.fighter1_last_name, winner_last_name) {
        return Some(fight.fighter1_name());
    }
    if partial(&fight.fighter2_last_name, winner_last_name) {
        return Some(fight.fighter2_name());
    }
    None
}

fn pair_matches(
    last_a: &str,
    last_b: &str,
    stored_a: &str,
    stored_b: &str,
    name_matches: fn(&str, &str) -> bool,
) -> bool {
    (name_matches(stored_a, last_a) && name_matches(stored_b, last_b))
        || (name_matches(stored_a, last_b) && name_matches(stored_b, last_a))
}

fn exact(stored: &str, scraped: &str) -> bool {
    stored.eq_ignore_ascii_case(scraped)
}

fn partial(stored: &str, scraped: &str) -> bool {
    let stored = stored.to_lowercase();
    let scraped = scraped.to_lowercase();
    stored.contains(&scraped) || scraped.contains(&stored)
}
