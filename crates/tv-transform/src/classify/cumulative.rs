//! Cumulative exposure time and cumulative dose.

use tv_model::{ExposureValue, Interval, TimeUnit};

use super::buckets::{Accrual, TOLERANCE, chunk, count_reached, split_on_thresholds};

/// Cut every interval into unit-sized chunks when `expand` is set.
fn expand_by(intervals: Vec<Interval>, expand: Option<TimeUnit>) -> Vec<Interval> {
    match expand {
        Some(unit) => intervals
            .iter()
            .flat_map(|interval| chunk(interval, unit.chunk_days()))
            .collect(),
        None => intervals,
    }
}

/// Cumulative exposed time in `unit`, reported at the end of each interval.
pub fn continuous(
    intervals: Vec<Interval>,
    reference: i64,
    unit: TimeUnit,
    expand: Option<TimeUnit>,
) -> Vec<Interval> {
    let mut exposed_days = 0_i64;
    expand_by(intervals, expand)
        .into_iter()
        .map(|interval| {
            if !interval.value.is_reference(reference) {
                exposed_days += interval.days();
            }
            Interval::new(
                interval.start,
                interval.stop,
                ExposureValue::Amount(unit.from_days(exposed_days as f64)),
            )
        })
        .collect()
}

/// Cumulative exposed time bucketed by `cuts` (in `unit`).
///
/// Bucket 0 is the reference value (no exposure yet); afterwards the bucket
/// is one more than the number of cutpoints reached.
pub fn duration(
    intervals: Vec<Interval>,
    reference: i64,
    cuts: &[f64],
    unit: TimeUnit,
) -> Vec<Interval> {
    let thresholds: Vec<f64> = cuts.iter().map(|cut| cut * unit.days_per_unit()).collect();
    let label = |measure: f64| {
        if measure <= TOLERANCE {
            ExposureValue::Code(reference)
        } else {
            ExposureValue::Code(1 + count_reached(measure, &thresholds) as i64)
        }
    };

    let mut exposed_days = 0_i64;
    let mut out = Vec::with_capacity(intervals.len());
    for interval in &intervals {
        let accrual = if interval.value.is_reference(reference) {
            Accrual::flat(exposed_days as f64)
        } else {
            Accrual::new(exposed_days as f64, 1.0)
        };
        out.extend(split_on_thresholds(interval, accrual, &thresholds, &label));
        if !interval.value.is_reference(reference) {
            exposed_days += interval.days();
        }
    }
    out
}

/// Dose carried by an interval: its amount, or nothing for reference rows.
fn dose_of(interval: &Interval) -> f64 {
    interval.value.amount().unwrap_or(0.0)
}

/// Cut into chunks, giving each chunk its share of the interval's dose.
fn expand_dose(intervals: Vec<Interval>, expand: Option<TimeUnit>) -> Vec<Interval> {
    let Some(unit) = expand else {
        return intervals;
    };
    let mut out = Vec::with_capacity(intervals.len());
    for interval in &intervals {
        let amount = interval.value.amount();
        let total_days = interval.days() as f64;
        for mut piece in chunk(interval, unit.chunk_days()) {
            if let Some(amount) = amount {
                piece.value = ExposureValue::Amount(amount * piece.days() as f64 / total_days);
            }
            out.push(piece);
        }
    }
    out
}

/// Running total of dose, reported at the end of each interval.
pub fn cumulative_dose(intervals: Vec<Interval>, expand: Option<TimeUnit>) -> Vec<Interval> {
    let mut total = 0.0;
    expand_dose(intervals, expand)
        .into_iter()
        .map(|interval| {
            total += dose_of(&interval);
            Interval::new(interval.start, interval.stop, ExposureValue::Amount(total))
        })
        .collect()
}

/// Running total of dose bucketed by `cuts`: 0 before any dose, then one
/// more than the number of cutpoints reached.
pub fn dose_buckets(intervals: Vec<Interval>, cuts: &[f64]) -> Vec<Interval> {
    let label = |measure: f64| {
        if measure <= TOLERANCE {
            ExposureValue::Code(0)
        } else {
            ExposureValue::Code(1 + count_reached(measure, cuts) as i64)
        }
    };

    let mut total = 0.0;
    let mut out = Vec::with_capacity(intervals.len());
    for interval in &intervals {
        let dose = dose_of(interval);
        let accrual = Accrual::new(total, dose / interval.days() as f64);
        out.extend(split_on_thresholds(interval, accrual, cuts, &label));
        total += dose;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amounts(intervals: &[Interval]) -> Vec<f64> {
        intervals.iter().filter_map(|i| i.value.amount()).collect()
    }

    #[test]
    fn test_continuous_days() {
        let intervals = vec![
            Interval::code(0, 9, 0),
            Interval::code(10, 19, 1),
            Interval::code(20, 29, 0),
            Interval::code(30, 34, 2),
        ];
        let out = continuous(intervals, 0, TimeUnit::Days, None);
        assert_eq!(amounts(&out), vec![0.0, 10.0, 10.0, 15.0]);
    }

    #[test]
    fn test_continuous_expanded_by_week() {
        let out = continuous(vec![Interval::code(0, 13, 1)], 0, TimeUnit::Weeks, Some(TimeUnit::Weeks));
        assert_eq!(out.len(), 2);
        assert_eq!(amounts(&out), vec![1.0, 2.0]);
    }

    #[test]
    fn test_duration_buckets_split_on_crossing() {
        // Cuts of 10 and 20 days; 30 exposed days after 5 unexposed.
        let intervals = vec![Interval::code(0, 4, 0), Interval::code(5, 34, 1)];
        let out = duration(intervals, 0, &[10.0, 20.0], TimeUnit::Days);
        assert_eq!(
            out,
            vec![
                Interval::code(0, 4, 0),
                Interval::code(5, 13, 1),
                Interval::code(14, 23, 2),
                Interval::code(24, 34, 3),
            ]
        );
    }

    #[test]
    fn test_duration_keeps_bucket_through_unexposed_time() {
        let intervals = vec![
            Interval::code(0, 14, 1),
            Interval::code(15, 29, 0),
            Interval::code(30, 39, 1),
        ];
        let out = duration(intervals, 0, &[10.0, 20.0], TimeUnit::Days);
        let codes: Vec<i64> = out.iter().filter_map(|i| i.value.code()).collect();
        // [0,8]=1 [9,14]=2 [15,29]=2 [30,33]=2 [34,39]=3
        assert_eq!(codes, vec![1, 2, 2, 2, 3]);
        assert_eq!(out[4].start, 34);
    }

    #[test]
    fn test_cumulative_dose() {
        let intervals = vec![
            Interval::code(0, 9, 0),
            Interval::new(10, 19, ExposureValue::Amount(100.0)),
            Interval::new(20, 29, ExposureValue::Amount(50.0)),
        ];
        let out = cumulative_dose(intervals, None);
        assert_eq!(amounts(&out), vec![0.0, 100.0, 150.0]);
    }

    #[test]
    fn test_cumulative_dose_expanded_allocates_by_chunk() {
        let out = cumulative_dose(
            vec![Interval::new(0, 13, ExposureValue::Amount(140.0))],
            Some(TimeUnit::Weeks),
        );
        assert_eq!(amounts(&out), vec![70.0, 140.0]);
    }

    #[test]
    fn test_dose_buckets() {
        // 10 per day over 20 days; cuts at 50 and 150.
        let intervals = vec![
            Interval::code(0, 4, 0),
            Interval::new(5, 24, ExposureValue::Amount(200.0)),
        ];
        let out = dose_buckets(intervals, &[50.0, 150.0]);
        assert_eq!(
            out,
            vec![
                Interval::code(0, 4, 0),
                Interval::code(5, 8, 1),
                Interval::code(9, 18, 2),
                Interval::code(19, 24, 3),
            ]
        );
    }
}
