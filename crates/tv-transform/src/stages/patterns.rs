//! Switching indicators and time in state over a finished partition.

use tv_model::{ExposureValue, Interval};

/// True when the intervals carry more than one distinct value.
pub fn has_switched(intervals: &[Interval]) -> bool {
    intervals
        .split_first()
        .is_some_and(|(first, rest)| rest.iter().any(|i| i.value != first.value))
}

/// Distinct values in order of first appearance, joined by `->`.
pub fn switching_pattern(intervals: &[Interval]) -> String {
    let mut seen: Vec<&ExposureValue> = Vec::new();
    for interval in intervals {
        if !seen.contains(&&interval.value) {
            seen.push(&interval.value);
        }
    }
    seen.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("->")
}

/// Cumulative days in the current run of identical values, per interval.
pub fn statetime(intervals: &[Interval]) -> Vec<i64> {
    let mut out = Vec::with_capacity(intervals.len());
    let mut running = 0_i64;
    let mut previous: Option<&ExposureValue> = None;
    for interval in intervals {
        if previous != Some(&interval.value) {
            running = 0;
        }
        running += interval.days();
        out.push(running);
        previous = Some(&interval.value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> Vec<Interval> {
        vec![
            Interval::code(0, 9, 0),
            Interval::code(10, 19, 1),
            Interval::code(20, 24, 2),
            Interval::code(25, 29, 1),
        ]
    }

    #[test]
    fn test_has_switched() {
        assert!(has_switched(&history()));
        assert!(!has_switched(&[Interval::code(0, 9, 1), Interval::code(15, 20, 1)]));
        assert!(!has_switched(&[]));
    }

    #[test]
    fn test_switching_pattern_first_appearance() {
        assert_eq!(switching_pattern(&history()), "0->1->2");
        assert_eq!(switching_pattern(&[]), "");
    }

    #[test]
    fn test_statetime_resets_on_change() {
        assert_eq!(statetime(&history()), vec![10, 10, 5, 5]);
        // Uncollapsed continuous rows with equal values keep accumulating.
        let same = vec![Interval::code(0, 9, 1), Interval::code(10, 14, 1)];
        assert_eq!(statetime(&same), vec![10, 15]);
    }
}
