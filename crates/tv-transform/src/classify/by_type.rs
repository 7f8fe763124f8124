//! Per-code status columns for ever-treated and current/former.

use tv_model::Interval;

const NEVER: i64 = 0;
const EVER: i64 = 1;
const CURRENT: i64 = 1;
const FORMER: i64 = 2;

/// One status column per code in `types`, aligned with `intervals`.
///
/// Ever-treated: 1 from the first interval carrying the code. Current/former:
/// 1 while the interval carries it, 2 once it has been carried before.
pub fn status_by_type(
    intervals: &[Interval],
    types: &[i64],
    current_former: bool,
) -> Vec<Vec<i64>> {
    types
        .iter()
        .map(|&code| {
            let mut seen = false;
            intervals
                .iter()
                .map(|interval| {
                    let carried = interval.value.has_code(code);
                    let status = match (current_former, carried, seen) {
                        (false, true, _) | (false, false, true) => EVER,
                        (true, true, _) => CURRENT,
                        (true, false, true) => FORMER,
                        (_, false, false) => NEVER,
                    };
                    seen |= carried;
                    status
                })
                .collect()
        })
        .collect()
}

/// Like [`crate::stages::collapse::collapse`], but abutting rows only merge
/// when every column agrees as well.
pub fn collapse_with_columns(
    intervals: Vec<Interval>,
    columns: Vec<Vec<i64>>,
) -> (Vec<Interval>, Vec<Vec<i64>>) {
    let mut out: Vec<Interval> = Vec::with_capacity(intervals.len());
    let mut kept: Vec<Vec<i64>> = vec![Vec::with_capacity(intervals.len()); columns.len()];
    for (row, interval) in intervals.into_iter().enumerate() {
        if let Some(previous) = out.last_mut()
            && previous.value == interval.value
            && i64::from(previous.stop) + 1 == i64::from(interval.start)
            && columns.iter().all(|column| column[row] == column[row - 1])
        {
            previous.stop = interval.stop;
            continue;
        }
        out.push(interval);
        for (target, column) in kept.iter_mut().zip(&columns) {
            target.push(column[row]);
        }
    }
    (out, kept)
}
