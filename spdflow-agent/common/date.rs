use chrono::{NaiveDate, Weekday};

/// Monday of ISO week `week` in `year`
pub fn iso_week_to_date(year: i32, week: u32) -> Option<NaiveDate> {
    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_week_to_date() {
        assert_eq!(
            iso_week_to_date(2025, 2),
            NaiveDate::from_ymd_opt(2025, 1, 6)
        );
        assert_eq!(
            iso_week_to_date(2025, 52),
            NaiveDate::from_ymd_opt(2025, 12, 22)
        );
        // 2020 has 53 ISO weeks, 2021 does not
        assert!(iso_week_to_date(2020, 53).is_some());
        assert!(iso_week_to_date(2021, 53).is_none());
        assert!(iso_week_to_date(2025, 0).is_none());
    }
}
