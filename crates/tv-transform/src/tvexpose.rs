//! Time-varying exposure construction over subject and exposure tables.
//!
//! Reads the observation windows and exposure records through the column
//! names in [`ExposeColumns`](tv_model::ExposeColumns), builds one partition
//! per subject in parallel and writes the partitions back as one table
//! sorted by `(id, start)`.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use polars::prelude::{Column, DataFrame};
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;
use tracing::{debug, info, info_span};

use tv_model::{
    ExposeOptions, ExposureDefinition, ExposurePlan, ExposureRecord, ExposureValue, Partition,
    Result, Subject, SubjectId, TvError,
};

use crate::context::{Diagnostic, DiagnosticSink, Diagnostics};
use crate::coverage::{CoverageRow, coverage_row};
use crate::frame::{
    day_column, gather_column, id_column, is_date_column, read_amounts, read_codes, read_days,
    read_ids, require_column, table_error,
};
use crate::pipeline::{SubjectPartition, build_partition_with_types};
use crate::stages::patterns;

const SUBJECTS_TABLE: &str = "subjects table";
const DEFAULT_GENERATE: &str = "tv_exposure";
const EXPOSURE_TABLE: &str = "exposure table";

/// Output interval column names.
pub const START_COLUMN: &str = "start";
pub const STOP_COLUMN: &str = "stop";

/// Counts and effective parameters of one `tv_expose` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposeSummary {
    pub n_persons: usize,
    pub n_periods: usize,
    /// Person-time in days over all subjects.
    pub total_time: i64,
    /// Records with a null or unusable id, date or value (e.g. a fractional code).
    pub dropped_records: usize,
    /// Records of subjects absent from the subjects table (best-effort mode).
    pub unmatched_records: usize,
    /// Records removed by clipping, lag or the duration window.
    pub excluded_records: usize,
    pub definition: &'static str,
    pub overlap: &'static str,
    pub grace: String,
    pub merge_days: i32,
    pub lag: i32,
    pub washout: i32,
    pub carryforward: i32,
    pub fillgaps: i32,
}

/// Result of [`tv_expose`].
#[derive(Debug, Clone)]
pub struct ExposeResult {
    pub data: DataFrame,
    /// Per-subject partitions, in output order.
    pub partitions: Vec<Partition>,
    pub summary: ExposeSummary,
    /// Filled when `validate` is set.
    pub coverage: Vec<CoverageRow>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Diagnostics for ExposeResult {
    fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

#[derive(Debug, Clone)]
struct SubjectRow {
    subject: Subject,
    row: usize,
}

/// Build the time-varying exposure table.
///
/// # Errors
///
/// - [`TvError::Configuration`] for invalid options
/// - [`TvError::MissingColumn`] if a configured column is absent
/// - [`TvError::InvalidWindow`] if a subject has no usable window
/// - [`TvError::UnmatchedSubjects`] for records of unknown subjects, unless
///   `best_effort` is set
/// - [`TvError::Convergence`] if merging or layering does not settle
pub fn tv_expose(
    subjects: &DataFrame,
    exposures: &DataFrame,
    options: &ExposeOptions,
) -> Result<ExposeResult> {
    let span = info_span!("tv_expose", generate = %options.generate);
    let _guard = span.enter();
    let started = Instant::now();

    let plan = options.resolve()?;
    let mut sink = DiagnosticSink::default();
    for note in &plan.notes {
        sink.warn(note.clone());
    }

    let (windows, records, dropped) = info_span!("read").in_scope(|| -> Result<_> {
        let start = Instant::now();
        let windows = read_subjects(subjects, options, &mut sink)?;
        let (records, dropped) = read_exposures(exposures, options, &plan)?;
        debug!(
            subjects = windows.len(),
            records = records.len(),
            dropped,
            duration_ms = start.elapsed().as_millis(),
            "inputs read"
        );
        Ok((windows, records, dropped))
    })?;
    if dropped > 0 {
        sink.warn(format!(
            "{dropped} exposure record(s) with a missing or unusable id, date or value dropped"
        ));
    }

    let mut by_subject: BTreeMap<SubjectId, Vec<ExposureRecord>> = BTreeMap::new();
    let mut unmatched = 0;
    for record in records {
        if windows.contains_key(&record.subject) {
            by_subject
                .entry(record.subject.clone())
                .or_default()
                .push(record);
        } else {
            unmatched += 1;
        }
    }
    if unmatched > 0 {
        if !options.best_effort {
            return Err(TvError::UnmatchedSubjects { count: unmatched });
        }
        sink.warn(format!(
            "{unmatched} exposure record(s) of subjects missing from the subjects table dropped"
        ));
    }

    let types: Vec<i64> = if plan.by_type {
        by_subject
            .values()
            .flatten()
            .filter_map(|record| record.value.code())
            .filter(|code| *code != plan.reference)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    } else {
        Vec::new()
    };

    let work: Vec<(&SubjectRow, &[ExposureRecord])> = windows
        .values()
        .map(|window| {
            let records = by_subject
                .get(&window.subject.id)
                .map_or(&[][..], Vec::as_slice);
            (window, records)
        })
        .collect();

    let built = info_span!("build").in_scope(|| -> Result<Vec<SubjectPartition>> {
        let start = Instant::now();
        let built = work
            .par_iter()
            .map(|(window, records)| {
                build_partition_with_types(&window.subject, records, &plan, &types)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            subjects = built.len(),
            duration_ms = start.elapsed().as_millis(),
            "partitions built"
        );
        Ok(built)
    })?;

    let excluded: usize = built.iter().map(|b| b.excluded).sum();
    let subject_rows: Vec<usize> = work.iter().map(|(window, _)| window.row).collect();
    let (partitions, type_columns): (Vec<Partition>, Vec<Vec<Vec<i64>>>) =
        built.into_iter().map(|b| (b.partition, b.types)).unzip();

    let data = info_span!("write").in_scope(|| {
        write_partitions(
            &partitions,
            &subject_rows,
            &ByType {
                codes: &types,
                columns: &type_columns,
            },
            subjects,
            options,
            &plan,
            &mut sink,
        )
    })?;

    let coverage = if options.validate {
        let rows: Vec<CoverageRow> = partitions.iter().filter_map(coverage_row).collect();
        for row in rows.iter().filter(|row| !row.is_complete()) {
            sink.push(
                Diagnostic::warning(format!(
                    "output covers {:.1}% of the observation window",
                    row.pct_covered
                ))
                .with_subject(row.subject.clone()),
            );
        }
        rows
    } else {
        Vec::new()
    };

    let summary = ExposeSummary {
        n_persons: partitions.len(),
        n_periods: data.height(),
        total_time: partitions.iter().map(Partition::person_time).sum(),
        dropped_records: dropped,
        unmatched_records: unmatched,
        excluded_records: excluded,
        definition: plan.definition.name(),
        overlap: plan.overlap.name(),
        grace: plan.grace.to_string(),
        merge_days: plan.merge_days,
        lag: plan.lag,
        washout: plan.washout,
        carryforward: plan.carryforward,
        fillgaps: plan.fillgaps,
    };
    info!(
        persons = summary.n_persons,
        periods = summary.n_periods,
        total_time = summary.total_time,
        excluded = summary.excluded_records,
        duration_ms = started.elapsed().as_millis(),
        "time-varying exposure built"
    );

    Ok(ExposeResult {
        data,
        partitions,
        summary,
        coverage,
        diagnostics: sink.into_vec(),
    })
}

/// Observation windows keyed by subject, keeping the first row of each id.
fn read_subjects(
    df: &DataFrame,
    options: &ExposeOptions,
    sink: &mut DiagnosticSink,
) -> Result<BTreeMap<SubjectId, SubjectRow>> {
    let columns = &options.columns;
    let ids = read_ids(require_column(df, SUBJECTS_TABLE, &columns.id)?)?;
    let entries = read_days(require_column(df, SUBJECTS_TABLE, &columns.entry)?)?;
    let exits = read_days(require_column(df, SUBJECTS_TABLE, &columns.exit)?)?;

    let mut windows = BTreeMap::new();
    let mut invalid = 0;
    let mut without_id = 0;
    let mut duplicates = 0;
    for (row, ((id, entry), exit)) in ids.into_iter().zip(entries).zip(exits).enumerate() {
        let Some(id) = id else {
            without_id += 1;
            continue;
        };
        let (Some(entry), Some(exit)) = (entry, exit) else {
            invalid += 1;
            continue;
        };
        if exit < entry {
            invalid += 1;
            continue;
        }
        if windows.contains_key(&id) {
            duplicates += 1;
            continue;
        }
        windows.insert(
            id.clone(),
            SubjectRow {
                subject: Subject::new(id, entry, exit),
                row,
            },
        );
    }

    if invalid > 0 {
        return Err(TvError::InvalidWindow { count: invalid });
    }
    if without_id > 0 {
        sink.push(
            Diagnostic::warning(format!("{without_id} subject row(s) without an id ignored"))
                .with_column(columns.id.clone()),
        );
    }
    if duplicates > 0 {
        sink.push(
            Diagnostic::warning(format!(
                "{duplicates} repeated subject row(s) ignored; the first row of each subject is used"
            ))
            .with_column(columns.id.clone()),
        );
    }
    Ok(windows)
}

/// Decoded exposure records and the number of incomplete rows dropped.
fn read_exposures(
    df: &DataFrame,
    options: &ExposeOptions,
    plan: &ExposurePlan,
) -> Result<(Vec<ExposureRecord>, usize)> {
    let columns = &options.columns;
    let ids = read_ids(require_column(df, EXPOSURE_TABLE, &columns.id)?)?;
    let starts = read_days(require_column(df, EXPOSURE_TABLE, &columns.start)?)?;
    let stops = if plan.pointtime {
        starts.clone()
    } else {
        read_days(require_column(df, EXPOSURE_TABLE, &columns.stop)?)?
    };
    let value_column = require_column(df, EXPOSURE_TABLE, &columns.exposure)?;
    let values: Vec<Option<ExposureValue>> = if plan.is_dose() {
        read_amounts(value_column)?
            .into_iter()
            .map(|amount| amount.map(ExposureValue::Amount))
            .collect()
    } else {
        read_codes(value_column)?
            .into_iter()
            .map(|code| code.map(ExposureValue::Code))
            .collect()
    };

    let mut records = Vec::with_capacity(ids.len());
    let mut dropped = 0;
    for (((id, start), stop), value) in ids.into_iter().zip(starts).zip(stops).zip(values) {
        match (id, start, stop, value) {
            (Some(id), Some(start), Some(stop), Some(value)) => {
                records.push(ExposureRecord::new(id, start, stop, value));
            }
            _ => dropped += 1,
        }
    }
    Ok((records, dropped))
}

/// Prefix of the per-code status columns: `ever`/`cf` under the default
/// variable name, the variable name otherwise.
fn type_stub<'a>(generate: &'a str, definition: &ExposureDefinition) -> &'a str {
    match definition {
        _ if generate != DEFAULT_GENERATE => generate,
        ExposureDefinition::CurrentFormer => "cf",
        _ => "ever",
    }
}

/// Column name for one exposure code; negative codes read `neg`.
fn type_column_name(stub: &str, code: i64) -> String {
    format!("{stub}{}", code.to_string().replace('-', "neg"))
}

/// Per-code status columns of every subject, in partition order.
struct ByType<'a> {
    codes: &'a [i64],
    columns: &'a [Vec<Vec<i64>>],
}

/// Flatten the partitions into the output table.
fn write_partitions(
    partitions: &[Partition],
    subject_rows: &[usize],
    by_type: &ByType<'_>,
    subjects: &DataFrame,
    options: &ExposeOptions,
    plan: &ExposurePlan,
    sink: &mut DiagnosticSink,
) -> Result<DataFrame> {
    let as_date = require_column(subjects, SUBJECTS_TABLE, &options.columns.entry)
        .map(is_date_column)?;
    let n_rows: usize = partitions.iter().map(|p| p.intervals.len()).sum();
    let mut ids = Vec::with_capacity(n_rows);
    let mut starts = Vec::with_capacity(n_rows);
    let mut stops = Vec::with_capacity(n_rows);
    let mut entries = Vec::with_capacity(n_rows);
    let mut exits = Vec::with_capacity(n_rows);
    let mut source_rows = Vec::with_capacity(n_rows);
    let mut switched = Vec::new();
    let mut pattern = Vec::new();
    let mut state_days = Vec::new();

    for (partition, row) in partitions.iter().zip(subject_rows) {
        let count = partition.intervals.len();
        for interval in &partition.intervals {
            ids.push(partition.subject.clone());
            starts.push(interval.start);
            stops.push(interval.stop);
            entries.push(partition.entry);
            exits.push(partition.exit);
            source_rows.push(Some(*row));
        }
        if plan.patterns.switching {
            let flag = i64::from(patterns::has_switched(&partition.intervals));
            switched.extend(std::iter::repeat_n(flag, count));
        }
        if plan.patterns.detail {
            let text = patterns::switching_pattern(&partition.intervals);
            pattern.extend(std::iter::repeat_n(text, count));
        }
        if plan.patterns.statetime {
            state_days.extend(patterns::statetime(&partition.intervals));
        }
    }

    let values = partitions.iter().flat_map(|p| p.intervals.iter().map(|i| &i.value));
    let generate = options.generate.as_str();
    let mut columns = vec![
        id_column(&options.columns.id, &ids),
        day_column(START_COLUMN, &starts, as_date)?,
        day_column(STOP_COLUMN, &stops, as_date)?,
    ];
    if options.keepdates {
        columns.push(day_column(&options.columns.entry, &entries, as_date)?);
        columns.push(day_column(&options.columns.exit, &exits, as_date)?);
    }
    if plan.definition.is_continuous() {
        let amounts: Vec<Option<f64>> = values.map(ExposureValue::amount).collect();
        columns.push(Column::new(generate.into(), amounts));
    } else {
        let codes: Vec<Option<i64>> = values.clone().map(ExposureValue::code).collect();
        columns.push(Column::new(generate.into(), codes));
        if partitions
            .iter()
            .any(|p| p.intervals.iter().any(|i| i.value.is_combination()))
        {
            let combinations: Vec<Option<String>> = values
                .map(|value| value.is_combination().then(|| value.to_string()))
                .collect();
            columns.push(Column::new(
                format!("{generate}_combination").into(),
                combinations,
            ));
        }
    }
    if plan.by_type {
        let stub = type_stub(generate, &plan.definition);
        for (index, code) in by_type.codes.iter().enumerate() {
            let status: Vec<i64> = by_type
                .columns
                .iter()
                .flat_map(|subject| subject[index].iter().copied())
                .collect();
            columns.push(Column::new(type_column_name(stub, *code).into(), status));
        }
    }
    if plan.patterns.switching {
        columns.push(Column::new("has_switched".into(), switched));
    }
    if plan.patterns.detail {
        columns.push(Column::new("switching_pattern".into(), pattern));
    }
    if plan.patterns.statetime {
        columns.push(Column::new("statetime".into(), state_days));
    }

    for name in &options.keepvars {
        if columns.iter().any(|column| column.name().as_str() == name) {
            sink.push(
                Diagnostic::warning("keep variable collides with an output column; skipped")
                    .with_column(name.clone()),
            );
            continue;
        }
        match subjects.column(name) {
            Ok(source) => columns.push(gather_column(source, &source_rows, name)?),
            Err(_) => sink.push(
                Diagnostic::warning("keep variable not found in the subjects table")
                    .with_column(name.clone()),
            ),
        }
    }

    DataFrame::new(columns).map_err(table_error)
}
