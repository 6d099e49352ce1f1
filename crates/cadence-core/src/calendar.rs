//! Pure calendar arithmetic. No state, no clocks.

use chrono::{Datelike, NaiveDate, Weekday};

use crate::models::OrdinalWeek;

pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Number of days in `(year, month)`. `month` must be 1..=12.
pub fn days_in_month(year: i32, month: u32) -> u8 {
    debug_assert!((1..=12).contains(&month));
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
    }
}

/// Resolves `(year, month, day)` to a date, clamping `day` to the last valid
/// day of the month when it overflows (day 31 in February resolves to
/// Feb 28/29).
pub fn clamp_day_of_month(year: i32, month: u32, day: u32) -> NaiveDate {
    let clamped = day.min(u32::from(days_in_month(year, month))).max(1);
    // Always valid after clamping.
    NaiveDate::from_ymd_opt(year, month, clamped).unwrap()
}

/// Resolves "the Nth `weekday` of `(year, month)`". A requested week that
/// does not exist (a fifth Friday in a four-Friday month) clamps to the last
/// such weekday; `OrdinalWeek::Last` asks for that directly.
pub fn nth_weekday_of_month(
    year: i32,
    month: u32,
    weekday: Weekday,
    ordinal: OrdinalWeek,
) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    let offset = (weekday.num_days_from_monday() + 7 - first.weekday().num_days_from_monday()) % 7;
    let first_hit = 1 + offset;
    let last_day = u32::from(days_in_month(year, month));
    let weeks_available = (last_day - first_hit) / 7;

    let week = match ordinal.index() {
        Some(n) => u32::from(n - 1).min(weeks_available),
        None => weeks_available,
    };

    NaiveDate::from_ymd_opt(year, month, first_hit + week * 7).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(2024, true)]
    #[case(2023, false)]
    #[case(2000, true)]
    #[case(1900, false)]
    #[case(2100, false)]
    fn test_leap_years(#[case] year: i32, #[case] expected: bool) {
        assert_eq!(is_leap_year(year), expected);
    }

    #[rstest]
    #[case(2024, 2, 29)]
    #[case(2023, 2, 28)]
    #[case(2024, 4, 30)]
    #[case(2024, 12, 31)]
    fn test_days_in_month(#[case] year: i32, #[case] month: u32, #[case] expected: u8) {
        assert_eq!(days_in_month(year, month), expected);
    }

    #[test]
    fn test_clamp_day_within_month() {
        let date = clamp_day_of_month(2024, 1, 15);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[rstest]
    #[case(2023, 2, 31, 28)]
    #[case(2024, 2, 31, 29)]
    #[case(2024, 4, 31, 30)]
    #[case(2024, 2, 29, 29)]
    fn test_clamp_day_overflow(
        #[case] year: i32,
        #[case] month: u32,
        #[case] day: u32,
        #[case] expected_day: u32,
    ) {
        let date = clamp_day_of_month(year, month, day);
        assert_eq!(date, NaiveDate::from_ymd_opt(year, month, expected_day).unwrap());
    }

    #[test]
    fn test_second_tuesday_of_march() {
        let date = nth_weekday_of_month(2024, 3, Weekday::Tue, OrdinalWeek::Second);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 12).unwrap());
    }

    #[test]
    fn test_first_weekday_on_the_first() {
        // 2024-01-01 is a Monday.
        let date = nth_weekday_of_month(2024, 1, Weekday::Mon, OrdinalWeek::First);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_last_friday_of_march() {
        let date = nth_weekday_of_month(2024, 3, Weekday::Fri, OrdinalWeek::Last);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 29).unwrap());
    }

    #[test]
    fn test_missing_fifth_clamps_to_last() {
        // February 2024 has four Fridays: 2, 9, 16, 23.
        let date = nth_weekday_of_month(2024, 2, Weekday::Fri, OrdinalWeek::Fifth);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 2, 23).unwrap());
    }

    #[test]
    fn test_fifth_when_it_exists() {
        // April 2024 has five Mondays: 1, 8, 15, 22, 29.
        let date = nth_weekday_of_month(2024, 4, Weekday::Mon, OrdinalWeek::Fifth);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 4, 29).unwrap());
    }
}
