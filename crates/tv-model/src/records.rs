//! Input records, already decoded from their tables.

use serde::{Deserialize, Serialize};

use crate::ids::SubjectId;
use crate::interval::Day;
use crate::value::ExposureValue;

/// A subject and its observation window. Invariant: `entry <= exit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub entry: Day,
    pub exit: Day,
}

impl Subject {
    pub fn new(id: impl Into<SubjectId>, entry: Day, exit: Day) -> Self {
        Self {
            id: id.into(),
            entry,
            exit,
        }
    }
}

/// One raw exposure period. Point-in-time records have `start == stop`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureRecord {
    pub subject: SubjectId,
    pub start: Day,
    pub stop: Day,
    pub value: ExposureValue,
}

impl ExposureRecord {
    pub fn new(subject: impl Into<SubjectId>, start: Day, stop: Day, value: ExposureValue) -> Self {
        Self {
            subject: subject.into(),
            start,
            stop,
            value,
        }
    }
}

/// One row of an events table.
///
/// `primary` is the outcome of interest; `competing` holds the competing-risk
/// dates in column order. Absent dates are censored on that channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub subject: SubjectId,
    pub primary: Option<Day>,
    pub competing: Vec<Option<Day>>,
    /// Row in the events table, used to carry extra columns.
    pub row: usize,
}

impl EventRecord {
    pub fn new(subject: impl Into<SubjectId>, primary: Option<Day>, competing: Vec<Option<Day>>) -> Self {
        Self {
            subject: subject.into(),
            primary,
            competing,
            row: 0,
        }
    }

    #[must_use]
    pub fn with_row(mut self, row: usize) -> Self {
        self.row = row;
        self
    }

    /// Resolve competing risks into the effective `(date, code)`.
    ///
    /// The primary event has code 1 and competing risk `k` (0-based column
    /// order) has code `k + 2`. A competing date wins only when it is strictly
    /// earlier than the current candidate; ties keep the earlier column.
    pub fn effective(&self) -> Option<(Day, i64)> {
        let mut best = self.primary.map(|date| (date, 1_i64));
        for (k, date) in self.competing.iter().enumerate() {
            let Some(date) = *date else { continue };
            let earlier = match best {
                Some((current, _)) => date < current,
                None => true,
            };
            if earlier {
                best = Some((date, k as i64 + 2));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_only() {
        let event = EventRecord::new(1_i64, Some(100), vec![]);
        assert_eq!(event.effective(), Some((100, 1)));
    }

    #[test]
    fn test_earlier_competing_wins() {
        let event = EventRecord::new(1_i64, Some(100), vec![Some(120), Some(90)]);
        assert_eq!(event.effective(), Some((90, 3)));
    }

    #[test]
    fn test_tie_keeps_primary() {
        let event = EventRecord::new(1_i64, Some(100), vec![Some(100)]);
        assert_eq!(event.effective(), Some((100, 1)));
    }

    #[test]
    fn test_missing_primary_uses_earliest_competing() {
        let event = EventRecord::new(1_i64, None, vec![Some(80), Some(70), None]);
        assert_eq!(event.effective(), Some((70, 3)));
        let censored = EventRecord::new(1_i64, None, vec![None]);
        assert_eq!(censored.effective(), None);
    }
}
