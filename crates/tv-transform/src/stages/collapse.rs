//! Merging of adjacent intervals that carry the same value.

use tv_model::Interval;

/// Merge abutting intervals with identical values. Idempotent.
pub fn collapse(intervals: Vec<Interval>) -> Vec<Interval> {
    let mut out: Vec<Interval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        if let Some(previous) = out.last_mut()
            && previous.value == interval.value
            && i64::from(previous.stop) + 1 == i64::from(interval.start)
        {
            previous.stop = interval.stop;
            continue;
        }
        out.push(interval);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_runs() {
        let out = collapse(vec![
            Interval::code(0, 9, 0),
            Interval::code(10, 19, 1),
            Interval::code(20, 29, 1),
            Interval::code(30, 39, 0),
        ]);
        assert_eq!(
            out,
            vec![
                Interval::code(0, 9, 0),
                Interval::code(10, 29, 1),
                Interval::code(30, 39, 0),
            ]
        );
        assert_eq!(collapse(out.clone()), out);
    }

    #[test]
    fn test_gap_prevents_collapse() {
        let intervals = vec![Interval::code(0, 9, 1), Interval::code(11, 19, 1)];
        assert_eq!(collapse(intervals.clone()), intervals);
    }
}
