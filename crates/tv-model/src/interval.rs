//! Intervals and per-subject partitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::SubjectId;
use crate::value::ExposureValue;

/// Day number counted from 1970-01-01 (day 0).
pub type Day = i32;

/// Inclusive day range carrying one value. Invariant: `start <= stop`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: Day,
    pub stop: Day,
    pub value: ExposureValue,
}

impl Interval {
    pub fn new(start: Day, stop: Day, value: ExposureValue) -> Self {
        Self { start, stop, value }
    }

    pub fn code(start: Day, stop: Day, code: i64) -> Self {
        Self::new(start, stop, ExposureValue::Code(code))
    }

    /// Number of days covered, both ends included.
    pub fn days(&self) -> i64 {
        i64::from(self.stop) - i64::from(self.start) + 1
    }

    /// True when both intervals share at least one day.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start.max(other.start) <= self.stop.min(other.stop)
    }
}

/// Why a partition fails to cover its observation window exactly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoverageIssue {
    #[error("partition has no intervals")]
    Empty,
    #[error("interval [{start}, {stop}] is inverted")]
    Inverted { start: Day, stop: Day },
    #[error("first interval starts at {start}, window entry is {entry}")]
    LateStart { start: Day, entry: Day },
    #[error("last interval stops at {stop}, window exit is {exit}")]
    EarlyStop { stop: Day, exit: Day },
    #[error("gap between day {after} and day {before}")]
    Gap { after: Day, before: Day },
    #[error("overlap at day {at}")]
    Overlap { at: Day },
}

/// All intervals of one subject, ordered by start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub subject: SubjectId,
    pub entry: Day,
    pub exit: Day,
    pub intervals: Vec<Interval>,
}

impl Partition {
    pub fn new(subject: SubjectId, entry: Day, exit: Day, intervals: Vec<Interval>) -> Self {
        Self {
            subject,
            entry,
            exit,
            intervals,
        }
    }

    /// Sum of interval lengths in days.
    pub fn person_time(&self) -> i64 {
        self.intervals.iter().map(Interval::days).sum()
    }

    /// Length of the observation window in days.
    pub fn window_days(&self) -> i64 {
        i64::from(self.exit) - i64::from(self.entry) + 1
    }

    /// True when consecutive intervals abut with neither gap nor overlap.
    pub fn is_contiguous(&self) -> bool {
        self.intervals
            .windows(2)
            .all(|pair| i64::from(pair[0].stop) + 1 == i64::from(pair[1].start))
    }

    /// Verify that the intervals tile `[entry, exit]` exactly.
    pub fn check_coverage(&self) -> Result<(), CoverageIssue> {
        let (Some(first), Some(last)) = (self.intervals.first(), self.intervals.last()) else {
            return Err(CoverageIssue::Empty);
        };
        if let Some(bad) = self.intervals.iter().find(|iv| iv.start > iv.stop) {
            return Err(CoverageIssue::Inverted {
                start: bad.start,
                stop: bad.stop,
            });
        }
        if first.start != self.entry {
            return Err(CoverageIssue::LateStart {
                start: first.start,
                entry: self.entry,
            });
        }
        for pair in self.intervals.windows(2) {
            let expected = i64::from(pair[0].stop) + 1;
            let next = i64::from(pair[1].start);
            if next > expected {
                return Err(CoverageIssue::Gap {
                    after: pair[0].stop,
                    before: pair[1].start,
                });
            }
            if next < expected {
                return Err(CoverageIssue::Overlap { at: pair[1].start });
            }
        }
        if last.stop != self.exit {
            return Err(CoverageIssue::EarlyStop {
                stop: last.stop,
                exit: self.exit,
            });
        }
        Ok(())
    }
}
