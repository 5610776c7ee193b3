use chrono::{Datelike, NaiveDate, Utc};

use crate::constants::SEASON_START_MONTH;

/// The season currently in progress (or the last one, before opening day)
pub fn current_season() -> i32 {
    current_season_at(Utc::now().date_naive())
}

pub fn current_season_at(today: NaiveDate) -> i32 {
    if today.month() < SEASON_START_MONTH {
        today.year() - 1
    } else {
        today.year()
    }
}

/// Cut a message down to `max_chars` characters, marking the cut
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let mut cut: String = message.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offseason_maps_to_previous_year() {
        let march = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        assert_eq!(current_season_at(march), 2024);
        let october = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        assert_eq!(current_season_at(october), 2025);
    }

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short", 10), "short");
        assert_eq!(truncate_message("abcdefghij", 4), "abcd...");
        // multi-byte characters are never split
        assert_eq!(truncate_message("ééééé", 2), "éé...");
    }
}
