//! Time since the end of the most recent exposure.

use tv_model::{Day, ExposureValue, Interval, TimeUnit};

use super::buckets::{Accrual, count_reached, split_on_thresholds};

/// Code of intervals during exposure.
const CURRENT: i64 = 1;

/// Recency category for each interval.
///
/// Exposed intervals are 1. Unexposed intervals after an exposure are
/// `2 + k`, where `k` is the number of cutpoints (in `unit`) the days since
/// the last exposed day have reached. Unexposed time before any exposure
/// keeps the reference value.
pub fn recency(
    intervals: Vec<Interval>,
    reference: i64,
    cuts: &[f64],
    unit: TimeUnit,
) -> Vec<Interval> {
    let thresholds: Vec<f64> = cuts.iter().map(|cut| cut * unit.days_per_unit()).collect();
    let label = |since: f64| ExposureValue::Code(2 + count_reached(since, &thresholds) as i64);

    let mut last_exposed: Option<Day> = None;
    let mut out = Vec::with_capacity(intervals.len());
    for interval in &intervals {
        if !interval.value.is_reference(reference) {
            last_exposed = Some(interval.stop);
            out.push(Interval::new(
                interval.start,
                interval.stop,
                ExposureValue::Code(CURRENT),
            ));
            continue;
        }
        match last_exposed {
            None => out.push(Interval::new(
                interval.start,
                interval.stop,
                ExposureValue::Code(reference),
            )),
            Some(end) => {
                let before = (i64::from(interval.start) - 1 - i64::from(end)) as f64;
                out.extend(split_on_thresholds(
                    interval,
                    Accrual::new(before, 1.0),
                    &thresholds,
                    &label,
                ));
            }
        }
    }
    out
}
