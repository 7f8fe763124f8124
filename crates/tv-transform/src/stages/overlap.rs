//! Resolution of overlapping intervals with different values.

use tv_model::{ExposurePlan, ExposureValue, Interval, OverlapStrategy, Result, TvError};

use super::merge::merge_pass;
use super::{MAX_ITERATIONS, sort_intervals};

/// Resolve overlaps so that the returned intervals are pairwise disjoint.
///
/// # Errors
///
/// Returns [`TvError::Convergence`] if layering does not settle.
pub fn resolve_overlaps(intervals: Vec<Interval>, plan: &ExposurePlan) -> Result<Vec<Interval>> {
    if intervals.len() < 2 {
        return Ok(intervals);
    }
    match &plan.overlap {
        OverlapStrategy::Layer => layer(intervals),
        OverlapStrategy::Priority(ranking) => Ok(priority(intervals, ranking)),
        OverlapStrategy::Split => Ok(split(intervals, plan.reference, plan.is_dose())),
    }
}

// =============================================================================
// Layer
// =============================================================================

/// Later-starting intervals dominate; an earlier interval resumes after the
/// later one when it originally extended past it.
///
/// When two intervals start on the same day the shorter one is laid last,
/// so the longer one resumes after it.
fn layer(mut intervals: Vec<Interval>) -> Result<Vec<Interval>> {
    for _ in 0..MAX_ITERATIONS {
        if !has_conflict(&intervals) {
            return Ok(intervals);
        }
        let layered = layer_pass(intervals);
        intervals = merge_pass(layered, 0).0;
    }
    Err(TvError::Convergence {
        stage: "layer overlap resolution",
        iterations: MAX_ITERATIONS,
    })
}

fn layer_pass(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(b.stop.cmp(&a.stop))
            .then_with(|| a.value.total_cmp(&b.value))
    });
    let mut laid: Vec<Interval> = Vec::with_capacity(intervals.len() * 2);
    for top in intervals {
        laid = carve(laid, &top);
        laid.push(top);
    }
    sort_intervals(&mut laid);
    laid
}

/// Remove the days of `top` from `base`, keeping the parts before and after.
fn carve(base: Vec<Interval>, top: &Interval) -> Vec<Interval> {
    let mut out = Vec::with_capacity(base.len() + 1);
    for interval in base {
        if !interval.overlaps(top) {
            out.push(interval);
            continue;
        }
        if interval.start < top.start {
            out.push(Interval::new(
                interval.start,
                top.start - 1,
                interval.value.clone(),
            ));
        }
        if interval.stop > top.stop {
            out.push(Interval::new(top.stop + 1, interval.stop, interval.value));
        }
    }
    out
}

/// True if any two intervals with different values share a day.
pub(crate) fn has_conflict(intervals: &[Interval]) -> bool {
    let mut sorted: Vec<&Interval> = intervals.iter().collect();
    sorted.sort_by_key(|interval| interval.start);
    for (i, current) in sorted.iter().enumerate() {
        for next in &sorted[i + 1..] {
            if next.start > current.stop {
                break;
            }
            if next.value != current.value {
                return true;
            }
        }
    }
    false
}

// =============================================================================
// Priority
// =============================================================================

/// Higher-ranked values keep their days; lower-ranked intervals only fill
/// days no higher-ranked interval covers. Unranked values rank last, and
/// among equal ranks the later start wins.
fn priority(mut intervals: Vec<Interval>, ranking: &[i64]) -> Vec<Interval> {
    let rank = |value: &ExposureValue| {
        value
            .code()
            .and_then(|code| ranking.iter().position(|r| *r == code))
            .unwrap_or(ranking.len())
    };
    intervals.sort_by(|a, b| {
        rank(&a.value)
            .cmp(&rank(&b.value))
            .then(b.start.cmp(&a.start))
            .then(a.stop.cmp(&b.stop))
    });

    let mut laid: Vec<Interval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        let pieces = uncovered(&interval, &laid);
        laid.extend(pieces);
    }
    sort_intervals(&mut laid);
    laid
}

/// Parts of `interval` not covered by any of `laid`.
fn uncovered(interval: &Interval, laid: &[Interval]) -> Vec<Interval> {
    let mut blockers: Vec<&Interval> = laid.iter().filter(|l| l.overlaps(interval)).collect();
    blockers.sort_by_key(|blocker| blocker.start);

    let mut pieces = Vec::new();
    let mut cursor = interval.start;
    for blocker in blockers {
        if blocker.start > cursor {
            pieces.push(Interval::new(
                cursor,
                blocker.start - 1,
                interval.value.clone(),
            ));
        }
        cursor = cursor.max(blocker.stop.saturating_add(1));
    }
    if cursor <= interval.stop {
        pieces.push(Interval::new(cursor, interval.stop, interval.value.clone()));
    }
    pieces
}

// =============================================================================
// Split
// =============================================================================

/// Cut at every boundary and emit one interval per elementary sub-range.
///
/// Categorical sub-ranges covered by several codes carry the combination of
/// the exposed codes. Dose sub-ranges carry the sum of each record's dose,
/// allocated in proportion to the days the sub-range takes from the record.
fn split(intervals: Vec<Interval>, reference: i64, dose: bool) -> Vec<Interval> {
    let mut points: Vec<i64> = intervals
        .iter()
        .flat_map(|interval| [i64::from(interval.start), i64::from(interval.stop) + 1])
        .collect();
    points.sort_unstable();
    points.dedup();

    let mut out = Vec::new();
    for pair in points.windows(2) {
        let (from, until) = (pair[0], pair[1] - 1);
        let active: Vec<&Interval> = intervals
            .iter()
            .filter(|interval| {
                i64::from(interval.start) <= from && i64::from(interval.stop) >= from
            })
            .collect();
        if active.is_empty() {
            continue;
        }
        // Both points come from i32 days, so the sub-range fits back into i32.
        let (Ok(start), Ok(stop)) = (i32::try_from(from), i32::try_from(until)) else {
            continue;
        };
        let value = if dose {
            allocate_dose(&active, until - from + 1)
        } else {
            combine_codes(&active, reference)
        };
        out.push(Interval::new(start, stop, value));
    }

    if dose {
        out
    } else {
        merge_pass(out, 0).0
    }
}

fn allocate_dose(active: &[&Interval], days: i64) -> ExposureValue {
    let total = active
        .iter()
        .map(|interval| {
            let amount = interval.value.amount().unwrap_or(0.0);
            amount * days as f64 / interval.days() as f64
        })
        .sum();
    ExposureValue::Amount(total)
}

fn combine_codes(active: &[&Interval], reference: i64) -> ExposureValue {
    let codes: Vec<i64> = active
        .iter()
        .filter_map(|interval| interval.value.code())
        .collect();
    if codes.iter().any(|code| *code != reference) {
        ExposureValue::combine(codes.into_iter().filter(|code| *code != reference))
    } else {
        ExposureValue::Code(reference)
    }
}
