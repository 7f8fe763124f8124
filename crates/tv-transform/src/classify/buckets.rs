//! Running measures and ordinal buckets.
//!
//! A running measure (cumulative exposed days, cumulative dose, days since
//! exposure) grows linearly across an interval. When it crosses a cutpoint
//! inside the interval, the interval is split on the first day on which the
//! cutpoint is reached, so every output row holds one bucket for all of its
//! days.

use tv_model::{Day, ExposureValue, Interval};

/// Absolute tolerance for comparing running measures with cutpoints.
pub const TOLERANCE: f64 = 1e-9;

/// Linear growth of a measure over the days of one interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Accrual {
    /// Value at the end of the day before the interval starts.
    pub before: f64,
    /// Increase per day.
    pub rate: f64,
}

impl Accrual {
    pub(crate) fn new(before: f64, rate: f64) -> Self {
        Self { before, rate }
    }

    /// A measure that does not change over the interval.
    pub(crate) fn flat(value: f64) -> Self {
        Self::new(value, 0.0)
    }

    /// Value after the first `days` days of the interval.
    pub(crate) fn after(&self, days: i64) -> f64 {
        self.before + self.rate * days as f64
    }
}

/// Number of thresholds reached by `measure`.
pub(crate) fn count_reached(measure: f64, thresholds: &[f64]) -> usize {
    thresholds
        .iter()
        .filter(|threshold| measure >= **threshold - TOLERANCE)
        .count()
}

/// Split `interval` where the accruing measure reaches a threshold and label
/// each piece with the measure at its last day.
pub(crate) fn split_on_thresholds(
    interval: &Interval,
    accrual: Accrual,
    thresholds: &[f64],
    label: impl Fn(f64) -> ExposureValue,
) -> Vec<Interval> {
    let days = interval.days();
    let mut starts: Vec<Day> = Vec::new();
    if accrual.rate > 0.0 {
        for threshold in thresholds {
            let reached_on = ((threshold - TOLERANCE - accrual.before) / accrual.rate).ceil();
            if reached_on >= 2.0 && reached_on <= days as f64 {
                // reached_on <= days, so the offset stays inside the interval.
                starts.push(interval.start + (reached_on as i64 - 1) as Day);
            }
        }
    }
    starts.sort_unstable();
    starts.dedup();

    let mut pieces = Vec::with_capacity(starts.len() + 1);
    let mut from = interval.start;
    for next in starts.into_iter().chain(std::iter::once(interval.stop + 1)) {
        let until = next - 1;
        let elapsed = i64::from(until) - i64::from(interval.start) + 1;
        pieces.push(Interval::new(from, until, label(accrual.after(elapsed))));
        from = next;
    }
    pieces
}

/// Cut an interval into consecutive chunks of `length` days; the last chunk
/// may be shorter.
pub(crate) fn chunk(interval: &Interval, length: i32) -> Vec<Interval> {
    let length = length.max(1);
    let mut pieces = Vec::new();
    let mut from = interval.start;
    loop {
        let until = from.saturating_add(length - 1).min(interval.stop);
        pieces.push(Interval::new(from, until, interval.value.clone()));
        if until >= interval.stop {
            break;
        }
        from = until + 1;
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(measure: f64) -> ExposureValue {
        ExposureValue::Code(count_reached(measure, &[10.0, 20.0]) as i64)
    }

    #[test]
    fn test_count_reached_boundaries() {
        let cuts = [10.0, 20.0];
        assert_eq!(count_reached(9.5, &cuts), 0);
        assert_eq!(count_reached(10.0, &cuts), 1);
        assert_eq!(count_reached(19.999_999_999_9, &cuts), 2);
        assert_eq!(count_reached(25.0, &cuts), 2);
    }

    #[test]
    fn test_split_on_first_day_reaching_cut() {
        // Measure 0 before day 0, one per day: reaches 10 at the end of day 9.
        let interval = Interval::code(0, 29, 1);
        let pieces = split_on_thresholds(&interval, Accrual::new(0.0, 1.0), &[10.0, 20.0], bucket);
        assert_eq!(
            pieces,
            vec![
                Interval::code(0, 8, 0),
                Interval::code(9, 18, 1),
                Interval::code(19, 29, 2),
            ]
        );
    }

    #[test]
    fn test_threshold_reached_on_first_day_does_not_split() {
        let interval = Interval::code(0, 4, 1);
        let pieces = split_on_thresholds(&interval, Accrual::new(9.5, 1.0), &[10.0], bucket);
        assert_eq!(pieces, vec![Interval::code(0, 4, 1)]);
    }

    #[test]
    fn test_flat_accrual_never_splits() {
        let interval = Interval::code(0, 99, 1);
        let pieces = split_on_thresholds(&interval, Accrual::flat(15.0), &[10.0, 20.0], bucket);
        assert_eq!(pieces, vec![Interval::code(0, 99, 1)]);
    }

    #[test]
    fn test_chunk_lengths() {
        let pieces = chunk(&Interval::code(0, 16, 1), 7);
        assert_eq!(
            pieces,
            vec![
                Interval::code(0, 6, 1),
                Interval::code(7, 13, 1),
                Interval::code(14, 16, 1),
            ]
        );
        assert_eq!(chunk(&Interval::code(3, 3, 1), 30).len(), 1);
    }
}
