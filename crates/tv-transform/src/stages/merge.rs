//! Same-value period merging.

use tv_model::{Interval, Result, TvError};

use super::{MAX_ITERATIONS, sort_intervals};

/// Coalesce same-value intervals whose gap (`next.start - stop - 1`) is at
/// most `merge_days`. Overlapping and abutting periods always qualify.
///
/// Passes repeat until one leaves the input unchanged.
///
/// # Errors
///
/// Returns [`TvError::Convergence`] if no fixed point is reached within
/// [`MAX_ITERATIONS`] passes.
pub fn merge_periods(mut intervals: Vec<Interval>, merge_days: i32) -> Result<Vec<Interval>> {
    for _ in 0..MAX_ITERATIONS {
        let (merged, changed) = merge_pass(intervals, merge_days);
        intervals = merged;
        if !changed {
            return Ok(intervals);
        }
    }
    Err(TvError::Convergence {
        stage: "period merging",
        iterations: MAX_ITERATIONS,
    })
}

/// One sweep over the intervals grouped by value. Returns the result sorted
/// by start and whether anything was merged.
pub(crate) fn merge_pass(mut intervals: Vec<Interval>, merge_days: i32) -> (Vec<Interval>, bool) {
    intervals.sort_by(|a, b| {
        a.value
            .total_cmp(&b.value)
            .then(a.start.cmp(&b.start))
            .then(a.stop.cmp(&b.stop))
    });

    let mut changed = false;
    let mut out: Vec<Interval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        if let Some(current) = out.last_mut()
            && current.value == interval.value
            && i64::from(interval.start) - i64::from(current.stop) - 1 <= i64::from(merge_days)
        {
            current.stop = current.stop.max(interval.stop);
            changed = true;
            continue;
        }
        out.push(interval);
    }

    sort_intervals(&mut out);
    (out, changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_same_value_merged() {
        let out = merge_periods(
            vec![Interval::code(0, 10, 1), Interval::code(5, 20, 1)],
            0,
        )
        .unwrap();
        assert_eq!(out, vec![Interval::code(0, 20, 1)]);
    }

    #[test]
    fn test_abutting_merged_with_zero_tolerance() {
        let out = merge_periods(
            vec![Interval::code(0, 10, 1), Interval::code(11, 20, 1)],
            0,
        )
        .unwrap();
        assert_eq!(out, vec![Interval::code(0, 20, 1)]);
    }

    #[test]
    fn test_gap_within_tolerance() {
        let intervals = vec![Interval::code(0, 10, 1), Interval::code(16, 20, 1)];
        assert_eq!(
            merge_periods(intervals.clone(), 5).unwrap(),
            vec![Interval::code(0, 20, 1)]
        );
        assert_eq!(merge_periods(intervals.clone(), 4).unwrap(), intervals);
    }

    #[test]
    fn test_different_values_untouched() {
        let intervals = vec![Interval::code(0, 10, 1), Interval::code(5, 20, 2)];
        assert_eq!(merge_periods(intervals.clone(), 30).unwrap(), intervals);
    }

    #[test]
    fn test_chain_merges_through_contained_period() {
        let out = merge_periods(
            vec![
                Interval::code(0, 100, 1),
                Interval::code(10, 20, 1),
                Interval::code(105, 110, 1),
            ],
            5,
        )
        .unwrap();
        assert_eq!(out, vec![Interval::code(0, 110, 1)]);
    }
}
