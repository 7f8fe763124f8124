//! Shared utilities for the time-varying exposure crates.
//!
//! This crate provides common utilities used across the workspace:
//! Polars `AnyValue` coercions, calendar day numbers, and subscriber
//! set-up for applications that host the engine.

pub mod dates;
pub mod logging;
pub mod polars;

// Re-export commonly used functions at crate root for convenience
pub use crate::dates::{date_to_day, day_to_date, format_day, parse_day};
pub use crate::polars::{any_to_day, any_to_f64, any_to_i64, parse_f64, parse_i64};
