//! Raw exposure records to canonical intervals.

use tv_model::{ExposurePlan, ExposureRecord, Interval, Subject};

use super::sort_intervals;

/// Intervals that survived normalization, plus the number of records removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub intervals: Vec<Interval>,
    pub excluded: usize,
}

/// Clip records to `[entry, exit]`, then apply lag, washout and the
/// duration window, in that order.
///
/// Records that end before they start, fall outside the window, are emptied
/// by the lag or fail the duration window are excluded and counted.
pub fn normalize(subject: &Subject, records: &[ExposureRecord], plan: &ExposurePlan) -> Normalized {
    let mut intervals = Vec::with_capacity(records.len());
    let mut excluded = 0;

    for record in records {
        match normalize_record(subject, record, plan) {
            Some(interval) => intervals.push(interval),
            None => excluded += 1,
        }
    }

    sort_intervals(&mut intervals);
    Normalized {
        intervals,
        excluded,
    }
}

fn normalize_record(
    subject: &Subject,
    record: &ExposureRecord,
    plan: &ExposurePlan,
) -> Option<Interval> {
    if record.stop < record.start {
        return None;
    }
    let mut start = record.start.max(subject.entry);
    let mut stop = record.stop.min(subject.exit);
    if stop < start {
        return None;
    }

    if plan.lag > 0 {
        start = start.saturating_add(plan.lag);
        if start > stop {
            return None;
        }
    }
    if plan.washout > 0 {
        stop = stop.saturating_add(plan.washout).min(subject.exit);
    }

    let interval = Interval::new(start, stop, record.value.clone());
    if let Some((min, max)) = plan.window {
        let days = interval.days();
        if days < i64::from(min) || days > i64::from(max) {
            return None;
        }
    }
    Some(interval)
}
