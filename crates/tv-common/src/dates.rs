//! Calendar day numbers.
//!
//! The engine works on integer day numbers counted from 1970-01-01, which is
//! the physical representation of a Polars `Date`. Day 0 is 1970-01-01.

use chrono::{Datelike, NaiveDate};

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Accepted textual date layouts, tried in order.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d%b%Y"];

/// Convert a calendar date to its day number.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use tv_common::date_to_day;
///
/// let date = NaiveDate::from_ymd_opt(1970, 1, 2).unwrap();
/// assert_eq!(date_to_day(date), 1);
/// ```
pub fn date_to_day(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

/// Convert a day number back to a calendar date.
///
/// Returns `None` when the day number is outside chrono's representable range.
pub fn day_to_date(day: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(day.checked_add(EPOCH_DAYS_FROM_CE)?)
}

/// Format a day number as `YYYY-MM-DD`, falling back to the raw number.
pub fn format_day(day: i32) -> String {
    match day_to_date(day) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => day.to_string(),
    }
}

/// Parse a day from text.
///
/// Accepts a plain integer day number or a calendar date in one of the
/// layouts `YYYY-MM-DD`, `YYYY/MM/DD` or `01jan2020`. A trailing time part
/// after `T` or a space is ignored.
///
/// # Examples
///
/// ```
/// use tv_common::parse_day;
///
/// assert_eq!(parse_day("1970-01-11"), Some(10));
/// assert_eq!(parse_day("  42 "), Some(42));
/// assert_eq!(parse_day("2020-02-30"), None);
/// assert_eq!(parse_day(""), None);
/// ```
pub fn parse_day(value: &str) -> Option<i32> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(day) = trimmed.parse::<i32>() {
        return Some(day);
    }
    let date_part = trimmed
        .split(|c| c == 'T' || c == ' ')
        .next()
        .unwrap_or(trimmed);
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
        .map(date_to_day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_is_day_zero() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(date_to_day(epoch), 0);
        assert_eq!(day_to_date(0), Some(epoch));
    }

    #[test]
    fn test_days_before_epoch_are_negative() {
        let date = NaiveDate::from_ymd_opt(1969, 12, 31).unwrap();
        assert_eq!(date_to_day(date), -1);
    }

    #[test]
    fn test_leap_year_span() {
        let start = parse_day("2020-01-01").unwrap();
        let stop = parse_day("2020-12-31").unwrap();
        assert_eq!(stop - start + 1, 366);
    }

    #[test]
    fn test_parse_formats() {
        let expected = parse_day("2021-03-15");
        assert!(expected.is_some());
        assert_eq!(parse_day("2021/03/15"), expected);
        assert_eq!(parse_day("15mar2021"), expected);
        assert_eq!(parse_day("2021-03-15T10:30:00"), expected);
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_day("not a date"), None);
        assert_eq!(parse_day("2021-13-01"), None);
    }

    #[test]
    fn test_format_day() {
        assert_eq!(format_day(0), "1970-01-01");
        assert_eq!(format_day(parse_day("2020-02-29").unwrap()), "2020-02-29");
    }
}
