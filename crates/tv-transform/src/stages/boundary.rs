//! Leading and trailing reference intervals.

use tv_model::{Day, ExposureValue, Interval};

/// Complete a gap-free interval list so that it covers `[entry, exit]`.
///
/// A subject without intervals gets a single reference interval over the
/// whole window.
pub fn complete_boundaries(
    mut intervals: Vec<Interval>,
    entry: Day,
    exit: Day,
    reference: i64,
) -> Vec<Interval> {
    let reference = ExposureValue::Code(reference);
    let (Some(first), Some(last)) = (intervals.first(), intervals.last()) else {
        return vec![Interval::new(entry, exit, reference)];
    };
    let (first_start, last_stop) = (first.start, last.stop);

    if last_stop < exit {
        intervals.push(Interval::new(last_stop + 1, exit, reference.clone()));
    }
    if first_start > entry {
        intervals.insert(0, Interval::new(entry, first_start - 1, reference));
    }
    intervals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adds_both_ends() {
        let out = complete_boundaries(vec![Interval::code(60, 181, 1)], 0, 365, 0);
        assert_eq!(
            out,
            vec![
                Interval::code(0, 59, 0),
                Interval::code(60, 181, 1),
                Interval::code(182, 365, 0),
            ]
        );
    }

    #[test]
    fn test_skips_covered_ends() {
        let intervals = vec![Interval::code(0, 365, 1)];
        assert_eq!(complete_boundaries(intervals.clone(), 0, 365, 0), intervals);
    }

    #[test]
    fn test_empty_subject_is_one_reference_interval() {
        assert_eq!(
            complete_boundaries(vec![], 5, 10, 9),
            vec![Interval::code(5, 10, 9)]
        );
    }
}
