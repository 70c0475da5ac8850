use chrono::{Days, NaiveDate};

/// Longest span, in days, that availability and calendar reads will walk.
pub const MAX_LOOKUP_DAYS: i64 = 366;

/// Number of nights between check-in and check-out.
///
/// Calendar dates carry no time component, so the whole-day difference is
/// already its own ceiling. Returns zero or a negative number when
/// `check_out <= check_in`; callers reject those upstream.
pub fn nights(check_in: NaiveDate, check_out: NaiveDate) -> i64 {
    (check_out - check_in).num_days()
}

/// Every night of a stay: `check_in` up to but excluding `check_out`, in order.
pub fn dates_in_range(check_in: NaiveDate, check_out: NaiveDate) -> Vec<NaiveDate> {
    check_in
        .iter_days()
        .take_while(|d| *d < check_out)
        .collect()
}

/// Inclusive span used by calendar reads.
pub fn dates_inclusive(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    match end.checked_add_days(Days::new(1)) {
        Some(after_end) => dates_in_range(start, after_end),
        None => dates_in_range(start, end),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_nights() {
        assert_eq!(nights(d(2024, 6, 10), d(2024, 6, 13)), 3);
        assert_eq!(nights(d(2024, 6, 1), d(2024, 7, 5)), 34);
        assert_eq!(nights(d(2024, 2, 28), d(2024, 3, 1)), 2);
        assert_eq!(nights(d(2024, 6, 13), d(2024, 6, 13)), 0);
    }

    #[test]
    fn test_dates_in_range_excludes_checkout() {
        let dates = dates_in_range(d(2024, 6, 10), d(2024, 6, 13));
        assert_eq!(dates, vec![d(2024, 6, 10), d(2024, 6, 11), d(2024, 6, 12)]);
    }

    #[test]
    fn test_dates_in_range_crosses_month_and_year() {
        let dates = dates_in_range(d(2024, 12, 30), d(2025, 1, 2));
        assert_eq!(dates, vec![d(2024, 12, 30), d(2024, 12, 31), d(2025, 1, 1)]);
        assert_eq!(dates.len() as i64, nights(d(2024, 12, 30), d(2025, 1, 2)));
    }

    #[test]
    fn test_empty_for_inverted_range() {
        assert!(dates_in_range(d(2024, 6, 13), d(2024, 6, 10)).is_empty());
    }

    #[test]
    fn test_dates_inclusive() {
        let dates = dates_inclusive(d(2024, 6, 1), d(2024, 6, 3));
        assert_eq!(dates.len(), 3);
        assert_eq!(dates.last(), Some(&d(2024, 6, 3)));
    }
}
