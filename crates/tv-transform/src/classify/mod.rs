//! Exposure-definition classification.
//!
//! Runs on a complete, gap-free partition and replaces each interval's raw
//! value with the value of the requested definition. Piecewise-constant
//! definitions may split an interval where a bucket changes; they are
//! collapsed afterwards by the caller.

mod buckets;
pub mod by_type;
pub mod cumulative;
pub mod recency;
pub mod status;

pub use buckets::TOLERANCE;

use tv_model::{ExposureDefinition, ExposurePlan, Interval};

/// Apply the plan's exposure definition to one subject's partition.
pub fn classify(intervals: Vec<Interval>, plan: &ExposurePlan) -> Vec<Interval> {
    let reference = plan.reference;
    match &plan.definition {
        ExposureDefinition::Categorical => intervals,
        ExposureDefinition::EverTreated => status::ever_treated(intervals, reference),
        ExposureDefinition::CurrentFormer => status::current_former(intervals, reference),
        ExposureDefinition::Continuous { unit } => {
            cumulative::continuous(intervals, reference, *unit, plan.expand)
        }
        ExposureDefinition::Duration { cuts, unit } => {
            cumulative::duration(intervals, reference, cuts, *unit)
        }
        ExposureDefinition::Recency { cuts, unit } => {
            recency::recency(intervals, reference, cuts, *unit)
        }
        ExposureDefinition::Dose { cuts: None } => {
            cumulative::cumulative_dose(intervals, plan.expand)
        }
        ExposureDefinition::Dose { cuts: Some(cuts) } => cumulative::dose_buckets(intervals, cuts),
    }
}
