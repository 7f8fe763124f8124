//! Polars AnyValue utility functions.
//!
//! This module provides helper functions for working with Polars `AnyValue` types:
//! numeric coercion, numeric parsing and day-number coercion.

use polars::prelude::{AnyValue, TimeUnit};

use crate::dates::parse_day;

/// Converts an `AnyValue` to `f64`, returning `None` for non-numeric or null values.
///
/// Handles integer types, floating-point types, booleans and string parsing.
pub fn any_to_f64(value: AnyValue<'_>) -> Option<f64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int8(v) => Some(f64::from(v)),
        AnyValue::Int16(v) => Some(f64::from(v)),
        AnyValue::Int32(v) => Some(f64::from(v)),
        AnyValue::Int64(v) => Some(v as f64),
        AnyValue::UInt8(v) => Some(f64::from(v)),
        AnyValue::UInt16(v) => Some(f64::from(v)),
        AnyValue::UInt32(v) => Some(f64::from(v)),
        AnyValue::UInt64(v) => Some(v as f64),
        AnyValue::Float32(v) if v.is_finite() => Some(f64::from(v)),
        AnyValue::Float64(v) if v.is_finite() => Some(v),
        AnyValue::Boolean(b) => Some(if b { 1.0 } else { 0.0 }),
        AnyValue::String(s) => parse_f64(s),
        AnyValue::StringOwned(s) => parse_f64(&s),
        _ => None,
    }
}

/// Converts an `AnyValue` to `i64`, returning `None` for non-integer or null values.
///
/// Floats are accepted only when they hold a whole number in range; `1.7` is
/// rejected rather than truncated.
pub fn any_to_i64(value: AnyValue<'_>) -> Option<i64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int8(v) => Some(i64::from(v)),
        AnyValue::Int16(v) => Some(i64::from(v)),
        AnyValue::Int32(v) => Some(i64::from(v)),
        AnyValue::Int64(v) => Some(v),
        AnyValue::UInt8(v) => Some(i64::from(v)),
        AnyValue::UInt16(v) => Some(i64::from(v)),
        AnyValue::UInt32(v) => Some(i64::from(v)),
        AnyValue::UInt64(v) => i64::try_from(v).ok(),
        AnyValue::Float32(v) => whole_number(f64::from(v)),
        AnyValue::Float64(v) => whole_number(v),
        AnyValue::Boolean(b) => Some(i64::from(b)),
        AnyValue::String(s) => parse_i64(s),
        AnyValue::StringOwned(s) => parse_i64(&s),
        _ => None,
    }
}

/// `i64` bounds as exact `f64` values: `-2^63` and `2^63`.
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

fn whole_number(value: f64) -> Option<i64> {
    let in_range = (I64_LOWER..I64_UPPER).contains(&value);
    (in_range && value.fract() == 0.0).then_some(value as i64)
}

/// Floor a float day number, `None` when it does not fit an `i32` day.
fn float_to_day(value: f64) -> Option<i32> {
    if !value.is_finite() {
        return None;
    }
    // `as` saturates, so anything past the i64 range also fails the i32 conversion.
    i32::try_from(value.floor() as i64).ok()
}

/// Converts an `AnyValue` to a day number counted from 1970-01-01.
///
/// Dates map to their physical value, datetimes are floored to the day,
/// integers and floats are taken as day numbers, and strings go through
/// [`parse_day`]. Values outside the `i32` day range yield `None`.
///
/// # Examples
///
/// ```
/// use polars::prelude::AnyValue;
/// use tv_common::any_to_day;
///
/// assert_eq!(any_to_day(AnyValue::Date(18262)), Some(18262));
/// assert_eq!(any_to_day(AnyValue::Int64(10)), Some(10));
/// assert_eq!(any_to_day(AnyValue::String("1970-01-03")), Some(2));
/// assert_eq!(any_to_day(AnyValue::Null), None);
/// ```
pub fn any_to_day(value: AnyValue<'_>) -> Option<i32> {
    match value {
        AnyValue::Null => None,
        AnyValue::Date(v) => Some(v),
        AnyValue::Datetime(v, unit, _) => datetime_to_day(v, unit),
        AnyValue::Float32(v) => float_to_day(f64::from(v)),
        AnyValue::Float64(v) => float_to_day(v),
        AnyValue::String(s) => parse_day(s),
        AnyValue::StringOwned(s) => parse_day(&s),
        other => any_to_i64(other).and_then(|v| i32::try_from(v).ok()),
    }
}

fn datetime_to_day(value: i64, unit: TimeUnit) -> Option<i32> {
    let per_day: i64 = match unit {
        TimeUnit::Nanoseconds => 86_400_000_000_000,
        TimeUnit::Microseconds => 86_400_000_000,
        TimeUnit::Milliseconds => 86_400_000,
    };
    i32::try_from(value.div_euclid(per_day)).ok()
}

/// Parses a string as `f64`, returning `None` for invalid or empty strings.
pub fn parse_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a string as `i64`, returning `None` for invalid or empty strings.
pub fn parse_i64(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<i64>().ok()
}
