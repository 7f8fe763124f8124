//! Per-subject composition of the interval stages.

use tracing::trace;

use tv_common::logging::redact_value;
use tv_model::{ExposureDefinition, ExposurePlan, ExposureRecord, Partition, Result, Subject};

use crate::classify::{by_type, classify};
use crate::stages::{boundary, collapse, gaps, merge, normalize, overlap};

/// One subject's finished partition.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectPartition {
    pub partition: Partition,
    /// Records removed by normalization.
    pub excluded: usize,
    /// Per-code status columns aligned with the partition's intervals.
    /// Empty unless built with [`build_partition_with_types`].
    pub types: Vec<Vec<i64>>,
}

/// Build the time-varying partition of one subject.
///
/// Stage order: normalize (clip, lag, washout, window), merge, resolve
/// overlaps, gap filling (grace, then carry-forward), fillgaps, boundary
/// completion, classification, collapse.
///
/// `records` must all belong to `subject`.
///
/// # Errors
///
/// Returns [`tv_model::TvError::Convergence`] if merging or layering does
/// not reach a fixed point.
pub fn build_partition(
    subject: &Subject,
    records: &[ExposureRecord],
    plan: &ExposurePlan,
) -> Result<SubjectPartition> {
    build_partition_with_types(subject, records, plan, &[])
}

/// [`build_partition`] plus one status column per code in `types` when the
/// plan classifies by type.
///
/// # Errors
///
/// Same as [`build_partition`].
pub fn build_partition_with_types(
    subject: &Subject,
    records: &[ExposureRecord],
    plan: &ExposurePlan,
    types: &[i64],
) -> Result<SubjectPartition> {
    let normalized = normalize::normalize(subject, records, plan);
    let normalized_count = normalized.intervals.len();

    // Doses are additive, so same-value doses are never coalesced.
    let merged = if plan.is_dose() {
        normalized.intervals
    } else {
        merge::merge_periods(normalized.intervals, plan.merge_days)?
    };
    let merged_count = merged.len();

    let resolved = overlap::resolve_overlaps(merged, plan)?;
    let resolved_count = resolved.len();

    let filled = gaps::fill_gaps(resolved, plan);
    let filled = gaps::extend_last(filled, plan, subject.exit);
    let completed = boundary::complete_boundaries(filled, subject.entry, subject.exit, plan.reference);

    let type_columns = if plan.by_type {
        let current_former = matches!(plan.definition, ExposureDefinition::CurrentFormer);
        by_type::status_by_type(&completed, types, current_former)
    } else {
        Vec::new()
    };

    let classified = classify(completed, plan);
    let (intervals, types) = if plan.by_type {
        by_type::collapse_with_columns(classified, type_columns)
    } else if plan.definition.is_collapsible() {
        (collapse::collapse(classified), type_columns)
    } else {
        (classified, type_columns)
    };

    trace!(
        subject = redact_value(&subject.id.to_string()),
        records = records.len(),
        normalized = normalized_count,
        merged = merged_count,
        resolved = resolved_count,
        output = intervals.len(),
        "subject partition built"
    );

    Ok(SubjectPartition {
        partition: Partition::new(subject.id.clone(), subject.entry, subject.exit, intervals),
        excluded: normalized.excluded,
        types,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tv_model::{ExposeOptions, ExposureValue, Grace, Interval};

    fn record(start: i32, stop: i32, code: i64) -> ExposureRecord {
        ExposureRecord::new(1_i64, start, stop, ExposureValue::Code(code))
    }

    fn build(records: &[ExposureRecord], options: ExposeOptions) -> Partition {
        let subject = Subject::new(1_i64, 0, 365);
        let plan = options.resolve().unwrap();
        build_partition(&subject, records, &plan).unwrap().partition
    }

    #[test]
    fn test_no_records_is_one_reference_interval() {
        let partition = build(&[], ExposeOptions::default());
        assert_eq!(partition.intervals, vec![Interval::code(0, 365, 0)]);
    }

    #[test]
    fn test_categorical_covers_window() {
        let partition = build(
            &[record(60, 181, 1), record(150, 250, 2)],
            ExposeOptions::default(),
        );
        assert_eq!(
            partition.intervals,
            vec![
                Interval::code(0, 59, 0),
                Interval::code(60, 149, 1),
                Interval::code(150, 250, 2),
                Interval::code(251, 365, 0),
            ]
        );
        assert_eq!(partition.check_coverage(), Ok(()));
    }

    #[test]
    fn test_evertreated_collapses() {
        let partition = build(
            &[record(10, 19, 1), record(40, 49, 2)],
            ExposeOptions::default().with_evertreated(),
        );
        assert_eq!(
            partition.intervals,
            vec![Interval::code(0, 9, 0), Interval::code(10, 365, 1)]
        );
    }

    #[test]
    fn test_grace_bridges_before_classification() {
        let partition = build(
            &[record(10, 19, 1), record(30, 39, 1)],
            ExposeOptions::default()
                .with_currentformer()
                .with_grace(Grace::Uniform(10)),
        );
        assert_eq!(
            partition.intervals,
            vec![
                Interval::code(0, 9, 0),
                Interval::code(10, 39, 1),
                Interval::code(40, 365, 2),
            ]
        );
    }

    #[test]
    fn test_excluded_records_counted() {
        let subject = Subject::new(1_i64, 100, 200);
        let plan = ExposeOptions::default().resolve().unwrap();
        let built = build_partition(&subject, &[record(0, 50, 1), record(120, 130, 1)], &plan).unwrap();
        assert_eq!(built.excluded, 1);
        assert_eq!(built.partition.intervals.len(), 3);
    }

    #[test]
    fn test_types_split_overall_status() {
        let subject = Subject::new(1_i64, 0, 365);
        let plan = ExposeOptions::default()
            .with_evertreated()
            .with_bytype()
            .resolve()
            .unwrap();
        let built = build_partition_with_types(
            &subject,
            &[record(10, 19, 1), record(40, 49, 2)],
            &plan,
            &[1, 2],
        )
        .unwrap();
        assert_eq!(
            built.partition.intervals,
            vec![
                Interval::code(0, 9, 0),
                Interval::code(10, 39, 1),
                Interval::code(40, 365, 1),
            ]
        );
        assert_eq!(built.types, vec![vec![0, 1, 1], vec![0, 0, 1]]);
    }
}
