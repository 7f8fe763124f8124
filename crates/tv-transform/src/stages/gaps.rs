//! Gap handling between resolved exposure intervals.

use tv_model::{Day, ExposurePlan, ExposureValue, Interval};

/// Fill the gaps between consecutive (disjoint, sorted) intervals.
///
/// A gap no longer than the grace of the preceding interval is bridged: a
/// same-value neighbour is merged, otherwise the preceding interval is
/// extended up to the next one. Longer gaps are first covered by
/// carry-forward of the preceding value, and whatever remains becomes a
/// reference interval.
///
/// Dose amounts are never merged, only extended, so the total dose is kept.
pub fn fill_gaps(intervals: Vec<Interval>, plan: &ExposurePlan) -> Vec<Interval> {
    let mut out: Vec<Interval> = Vec::with_capacity(intervals.len() * 2);
    for interval in intervals {
        let Some(previous) = out.last_mut() else {
            out.push(interval);
            continue;
        };
        let gap = i64::from(interval.start) - i64::from(previous.stop) - 1;
        if gap <= 0 {
            out.push(interval);
            continue;
        }

        let grace = i64::from(plan.grace.days_after(&previous.value));
        if gap <= grace {
            if previous.value == interval.value && previous.value.amount().is_none() {
                previous.stop = interval.stop;
                continue;
            }
            previous.stop = interval.start - 1;
            out.push(interval);
            continue;
        }

        let carry = gap.min(i64::from(plan.carryforward));
        // carry <= gap, and the gap lies between two i32 days.
        let carried_stop = previous.stop + carry as Day;
        previous.stop = carried_stop;
        if carry < gap {
            out.push(Interval::new(
                carried_stop + 1,
                interval.start - 1,
                ExposureValue::Code(plan.reference),
            ));
        }
        out.push(interval);
    }
    out
}

/// Let the last interval continue `plan.fillgaps` more days, capped at `exit`,
/// when it carries an exposed value.
pub fn extend_last(mut intervals: Vec<Interval>, plan: &ExposurePlan, exit: Day) -> Vec<Interval> {
    if plan.fillgaps > 0
        && let Some(last) = intervals.last_mut()
        && !last.value.is_reference(plan.reference)
        && last.stop < exit
    {
        last.stop = last.stop.saturating_add(plan.fillgaps).min(exit);
    }
    intervals
}

#[cfg(test)]
mod tests {
    use super::*;
    use tv_model::{ExposeOptions, Grace};
    use std::collections::BTreeMap;

    fn plan(options: ExposeOptions) -> ExposurePlan {
        options.resolve().unwrap()
    }

    #[test]
    fn test_gap_beyond_grace_gets_reference() {
        // 15-day gap between [0,9] and [25,40].
        let intervals = vec![Interval::code(0, 9, 1), Interval::code(25, 40, 1)];
        let out = fill_gaps(
            intervals,
            &plan(ExposeOptions::default().with_grace(Grace::Uniform(14))),
        );
        assert_eq!(
            out,
            vec![
                Interval::code(0, 9, 1),
                Interval::code(10, 24, 0),
                Interval::code(25, 40, 1),
            ]
        );
    }

    #[test]
    fn test_gap_within_grace_bridged() {
        let intervals = vec![Interval::code(0, 9, 1), Interval::code(25, 40, 1)];
        let out = fill_gaps(
            intervals,
            &plan(ExposeOptions::default().with_grace(Grace::Uniform(15))),
        );
        assert_eq!(out, vec![Interval::code(0, 40, 1)]);
    }

    #[test]
    fn test_grace_between_different_values_extends_previous() {
        let intervals = vec![Interval::code(0, 9, 1), Interval::code(15, 40, 2)];
        let out = fill_gaps(
            intervals,
            &plan(ExposeOptions::default().with_grace(Grace::Uniform(10))),
        );
        assert_eq!(
            out,
            vec![Interval::code(0, 14, 1), Interval::code(15, 40, 2)]
        );
    }

    #[test]
    fn test_grace_by_value_uses_preceding_value() {
        let grace = Grace::ByValue {
            default: 0,
            values: BTreeMap::from([(1, 30)]),
        };
        let intervals = vec![
            Interval::code(0, 9, 1),
            Interval::code(30, 40, 2),
            Interval::code(60, 70, 2),
        ];
        let out = fill_gaps(intervals, &plan(ExposeOptions::default().with_grace(grace)));
        assert_eq!(
            out,
            vec![
                Interval::code(0, 29, 1),
                Interval::code(30, 40, 2),
                Interval::code(41, 59, 0),
                Interval::code(60, 70, 2),
            ]
        );
    }

    #[test]
    fn test_carryforward_then_reference() {
        let intervals = vec![Interval::code(0, 9, 1), Interval::code(30, 40, 2)];
        let out = fill_gaps(
            intervals,
            &plan(ExposeOptions::default().with_carryforward(5)),
        );
        assert_eq!(
            out,
            vec![
                Interval::code(0, 14, 1),
                Interval::code(15, 29, 0),
                Interval::code(30, 40, 2),
            ]
        );
    }

    #[test]
    fn test_carryforward_covers_short_gap() {
        let intervals = vec![Interval::code(0, 9, 1), Interval::code(13, 40, 2)];
        let out = fill_gaps(
            intervals,
            &plan(ExposeOptions::default().with_carryforward(5)),
        );
        assert_eq!(
            out,
            vec![Interval::code(0, 12, 1), Interval::code(13, 40, 2)]
        );
    }

    #[test]
    fn test_dose_amounts_not_merged() {
        let intervals = vec![
            Interval::new(0, 9, ExposureValue::Amount(5.0)),
            Interval::new(12, 20, ExposureValue::Amount(5.0)),
        ];
        let out = fill_gaps(
            intervals,
            &plan(
                ExposeOptions::default()
                    .with_dose()
                    .with_grace(Grace::Uniform(5)),
            ),
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].stop, 11);
    }

    #[test]
    fn test_extend_last_capped_at_exit() {
        let intervals = vec![Interval::code(0, 9, 0), Interval::code(10, 90, 1)];
        let out = extend_last(intervals, &plan(ExposeOptions::default().with_fillgaps(30)), 100);
        assert_eq!(out[1], Interval::code(10, 100, 1));

        let reference_last = vec![Interval::code(10, 90, 0)];
        let out = extend_last(
            reference_last.clone(),
            &plan(ExposeOptions::default().with_fillgaps(30)),
            100,
        );
        assert_eq!(out, reference_last);
    }
}
