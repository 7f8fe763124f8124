//! Coverage checks over finished partitions and merged rows.

use serde::Serialize;

use tv_model::{Day, Partition, SubjectId};

/// How much of a subject's observation window the output covers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageRow {
    pub subject: SubjectId,
    pub first_start: Day,
    pub last_stop: Day,
    pub total_days: i64,
    pub expected_days: i64,
    pub gap_days: i64,
    pub pct_covered: f64,
}

impl CoverageRow {
    pub fn is_complete(&self) -> bool {
        self.gap_days == 0
    }
}

/// Coverage of one partition; `None` when it has no intervals.
pub fn coverage_row(partition: &Partition) -> Option<CoverageRow> {
    let first = partition.intervals.first()?;
    let last = partition.intervals.last()?;
    let total_days = partition.person_time();
    let expected_days = partition.window_days();
    let pct_covered = if expected_days > 0 {
        100.0 * total_days as f64 / expected_days as f64
    } else {
        0.0
    };
    Some(CoverageRow {
        subject: partition.subject.clone(),
        first_start: first.start,
        last_stop: last.stop,
        total_days,
        expected_days,
        gap_days: expected_days - total_days,
        pct_covered,
    })
}

/// First interior gap between spans sorted by start, as `(after, before)`.
pub(crate) fn find_gap(spans: &[(Day, Day)]) -> Option<(Day, Day)> {
    let mut covered_to = spans.first()?.1;
    for &(start, stop) in &spans[1..] {
        if i64::from(start) > i64::from(covered_to) + 1 {
            return Some((covered_to, start));
        }
        covered_to = covered_to.max(stop);
    }
    None
}

/// First day shared by two spans sorted by start.
pub(crate) fn find_overlap(spans: &[(Day, Day)]) -> Option<Day> {
    let mut covered_to = spans.first()?.1;
    for &(start, stop) in &spans[1..] {
        if start <= covered_to {
            return Some(start);
        }
        covered_to = covered_to.max(stop);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tv_model::Interval;

    #[test]
    fn test_complete_partition() {
        let partition = Partition::new(
            SubjectId::Int(1),
            0,
            99,
            vec![Interval::code(0, 49, 0), Interval::code(50, 99, 1)],
        );
        let row = coverage_row(&partition).unwrap();
        assert!(row.is_complete());
        assert_eq!(row.total_days, 100);
        assert!((row.pct_covered - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_partition() {
        let partition = Partition::new(SubjectId::Int(1), 0, 99, vec![Interval::code(0, 24, 1)]);
        let row = coverage_row(&partition).unwrap();
        assert_eq!(row.gap_days, 75);
        assert!((row.pct_covered - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_gap_and_overlap_detection() {
        assert_eq!(find_gap(&[(0, 9), (10, 19)]), None);
        assert_eq!(find_gap(&[(0, 9), (12, 19)]), Some((9, 12)));
        assert_eq!(find_overlap(&[(0, 9), (10, 19)]), None);
        assert_eq!(find_overlap(&[(0, 9), (9, 19)]), Some(9));
        assert_eq!(find_overlap(&[]), None);
    }
}
