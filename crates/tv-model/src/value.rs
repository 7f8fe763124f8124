//! Values carried by intervals.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The value an interval carries.
///
/// Categorical exposures use [`ExposureValue::Code`]. Under the split
/// overlap strategy a sub-range covered by several categories at once carries
/// a [`ExposureValue::Combination`]. Dose amounts and every cumulative measure
/// use [`ExposureValue::Amount`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExposureValue {
    Code(i64),
    Combination(Vec<i64>),
    Amount(f64),
}

impl ExposureValue {
    /// Build a value from the set of codes active over one sub-range.
    ///
    /// Codes are sorted and de-duplicated; a single code stays a `Code`.
    pub fn combine(codes: impl IntoIterator<Item = i64>) -> Self {
        let mut codes: Vec<i64> = codes.into_iter().collect();
        codes.sort_unstable();
        codes.dedup();
        if codes.len() == 1 {
            Self::Code(codes[0])
        } else {
            Self::Combination(codes)
        }
    }

    /// True for the reference (unexposed) code and for a zero amount.
    pub fn is_reference(&self, reference: i64) -> bool {
        match self {
            Self::Code(code) => *code == reference,
            Self::Combination(codes) => codes.is_empty(),
            Self::Amount(amount) => *amount == 0.0,
        }
    }

    /// Returns the categorical code, if this is one.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Code(code) => Some(*code),
            _ => None,
        }
    }

    /// True when `code` is active: the code itself or part of a combination.
    pub fn has_code(&self, code: i64) -> bool {
        match self {
            Self::Code(own) => *own == code,
            Self::Combination(codes) => codes.contains(&code),
            Self::Amount(_) => false,
        }
    }

    /// Returns the numeric amount, if this is one.
    pub fn amount(&self) -> Option<f64> {
        match self {
            Self::Amount(amount) => Some(*amount),
            _ => None,
        }
    }

    pub fn is_combination(&self) -> bool {
        matches!(self, Self::Combination(_))
    }

    /// Total order used to group intervals by value: codes, then
    /// combinations, then amounts.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Code(a), Self::Code(b)) => a.cmp(b),
            (Self::Combination(a), Self::Combination(b)) => a.cmp(b),
            (Self::Amount(a), Self::Amount(b)) => a.total_cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Code(_) => 0,
            Self::Combination(_) => 1,
            Self::Amount(_) => 2,
        }
    }
}

impl fmt::Display for ExposureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Combination(codes) => {
                let parts: Vec<String> = codes.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join("+"))
            }
            Self::Amount(amount) => write!(f, "{amount}"),
        }
    }
}
