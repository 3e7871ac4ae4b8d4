use chrono::{DateTime, Utc};

/// Derives a scrape target identifier from stored event data when none was
/// configured. The shape matches the slug convention the live endpoints
/// use: promotion and event name, lowercased, followed by the calendar date.
pub fn resolve_scrape_target(promotion: &str, name: &str, event_date: DateTime<Utc>) -> String {
    let mut slug = String::new();
    for part in [promotion, name] {
        for word in part.split_whitespace() {
            let cleaned: String = word
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase();
            if cleaned.is_empty() {
                continue;
            }
            if !slug.is_empty() {
                slug.push('-');
            }
            slug.push_str(&cleaned);
        }
    }
    if slug.is_empty() {
        slug.push_str("event");
    }
    format!("{}-{}", slug, event_date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn builds_slug_from_promotion_name_and_date() {
        let date = Utc.with_ymd_and_hms(2026, 8, 15, 0, 0, 0).unwrap();
        assert_eq!(
            resolve_scrape_target("UFC", "Fight Night: Silva vs. Jones", date),
            "ufc-fight-night-silva-vs-jones-2026-08-15"
        );
    }

    #[test]
    fn strips_punctuation_and_repeated_promotion() {
        let date = Utc.with_ymd_and_hms(2026, 1, 3, 0, 0, 0).unwrap();
        assert_eq!(
            resolve_scrape_target("ONE", "ONE 170", date),
            "one-one-170-2026-01-03"
        );
    }

    #[test]
    fn falls_back_when_everything_is_punctuation() {
        let date = Utc.with_ymd_and_hms(2026, 1, 3, 0, 0, 0).unwrap();
        assert_eq!(resolve_scrape_target("", "???", date), "event-2026-01-03");
    }
}
