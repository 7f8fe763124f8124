//! Ever-treated and current/former status.

use tv_model::{ExposureValue, Interval};

const NEVER: i64 = 0;
const EVER: i64 = 1;
const CURRENT: i64 = 1;
const FORMER: i64 = 2;

/// 0 before the first exposed interval, 1 from its start onward.
pub fn ever_treated(intervals: Vec<Interval>, reference: i64) -> Vec<Interval> {
    let mut treated = false;
    intervals
        .into_iter()
        .map(|interval| {
            treated |= !interval.value.is_reference(reference);
            let code = if treated { EVER } else { NEVER };
            Interval::new(interval.start, interval.stop, ExposureValue::Code(code))
        })
        .collect()
}

/// 0 before the first exposure, 1 while exposed, 2 when no longer exposed.
pub fn current_former(intervals: Vec<Interval>, reference: i64) -> Vec<Interval> {
    let mut exposed_before = false;
    intervals
        .into_iter()
        .map(|interval| {
            let code = if !interval.value.is_reference(reference) {
                exposed_before = true;
                CURRENT
            } else if exposed_before {
                FORMER
            } else {
                NEVER
            };
            Interval::new(interval.start, interval.stop, ExposureValue::Code(code))
        })
        .collect()
}
