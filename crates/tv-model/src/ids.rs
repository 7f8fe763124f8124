use std::fmt;

use serde::{Deserialize, Serialize};

/// Subject identifier as found in the input tables.
///
/// Integer ids sort numerically and before textual ids, so that output
/// tables come out in natural `(id, start)` order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubjectId {
    Int(i64),
    Text(String),
}

impl SubjectId {
    /// Returns the integer id, if this is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for SubjectId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for SubjectId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SubjectId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
