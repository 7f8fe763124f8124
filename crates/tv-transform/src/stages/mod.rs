//! Per-subject interval stages.
//!
//! Every stage is a pure function over one subject's intervals. They are
//! composed in a fixed order by [`crate::pipeline::build_partition`]:
//!
//! - **normalize**: clip to the observation window, lag, washout, duration window
//! - **merge**: coalesce same-value periods within the merge tolerance
//! - **overlap**: resolve different-value overlaps (priority, split, layer)
//! - **gaps**: grace bridging, carry-forward, reference gap intervals, fillgaps
//! - **boundary**: leading and trailing reference intervals
//! - **collapse**: merge adjacent intervals with identical values
//! - **patterns**: switching indicators and time in state

pub mod boundary;
pub mod collapse;
pub mod gaps;
pub mod merge;
pub mod normalize;
pub mod overlap;
pub mod patterns;

use tv_model::Interval;

/// Safety cap for the fixed-point loops in merging and overlap resolution.
pub const MAX_ITERATIONS: usize = 1000;

/// Sort by start, then stop, then value.
pub(crate) fn sort_intervals(intervals: &mut [Interval]) {
    intervals.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(a.stop.cmp(&b.stop))
            .then_with(|| a.value.total_cmp(&b.value))
    });
}
