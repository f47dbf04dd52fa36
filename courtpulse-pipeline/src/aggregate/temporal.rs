//! Weekly bucketing of comment timestamps

use chrono::{DateTime, Datelike, Days, NaiveDate};

/// Truncate an epoch timestamp to the Monday of its UTC week.
///
/// Returns `None` for timestamps chrono cannot represent.
pub fn week_start(created_utc: i64) -> Option<NaiveDate> {
    let date = DateTime::from_timestamp(created_utc, 0)?.date_naive();
    date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_midweek_truncates_to_monday() {
        // Wednesday 2024-10-09 15:00 UTC
        assert_eq!(week_start(1_728_486_000), Some(date(2024, 10, 7)));
    }

    #[test]
    fn test_monday_is_fixed_point() {
        // Monday 2024-10-07 00:00 UTC
        assert_eq!(week_start(1_728_259_200), Some(date(2024, 10, 7)));
    }

    #[test]
    fn test_sunday_belongs_to_preceding_monday() {
        // Sunday 2024-10-13 23:59 UTC
        assert_eq!(week_start(1_728_863_940), Some(date(2024, 10, 7)));
    }

    #[test]
    fn test_week_dates_serialize_as_iso() {
        let week = week_start(1_728_486_000).unwrap();
        assert_eq!(serde_json::to_value(week).unwrap(), "2024-10-07");
    }
}
