//! Intersection of several time-varying tables that share subjects.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use polars::prelude::{Column, DataFrame};
use serde::Serialize;
use tracing::{debug, info, info_span};

use tv_model::{Day, MergeOptions, MergeSource, Result, SubjectId, TvError};

use crate::batch::run_batched;
use crate::context::{Diagnostic, DiagnosticSink, Diagnostics};
use crate::coverage::{find_gap, find_overlap};
use crate::frame::{
    day_column, gather_column, id_column, is_date_column, read_amounts, read_days, read_ids,
    require_column, table_error,
};
use crate::intersect::{Joined, Span, intersect, scale};

/// Counts of one `tv_merge` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeSummary {
    pub n_persons: usize,
    pub n_periods: usize,
    pub avg_periods: f64,
    pub max_periods: usize,
    pub n_datasets: usize,
    /// Output value column per dataset, in dataset order.
    pub value_columns: Vec<String>,
}

/// Result of [`tv_merge`].
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub data: DataFrame,
    pub summary: MergeSummary,
    pub diagnostics: Vec<Diagnostic>,
}

impl Diagnostics for MergeResult {
    fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

/// One input table, decoded.
struct Source<'a> {
    label: String,
    df: &'a DataFrame,
    mapping: &'a MergeSource,
    spans: BTreeMap<SubjectId, Vec<Span>>,
    /// Interval length of every row, `None` for rows that were skipped.
    row_days: Vec<Option<i64>>,
}

impl<'a> Source<'a> {
    fn read(index: usize, df: &'a DataFrame, mapping: &'a MergeSource, id: &str) -> Result<(Self, usize)> {
        let label = format!("dataset {}", index + 1);
        let ids = read_ids(require_column(df, &label, id)?)?;
        let starts = read_days(require_column(df, &label, &mapping.start)?)?;
        let stops = read_days(require_column(df, &label, &mapping.stop)?)?;
        require_column(df, &label, &mapping.value)?;

        let mut spans: BTreeMap<SubjectId, Vec<Span>> = BTreeMap::new();
        let mut row_days = vec![None; ids.len()];
        let mut skipped = 0;
        for (row, ((id, start), stop)) in ids.into_iter().zip(starts).zip(stops).enumerate() {
            match (id, start, stop) {
                (Some(id), Some(start), Some(stop)) if start <= stop => {
                    let span = Span::new(start, stop, row);
                    row_days[row] = Some(span.days());
                    spans.entry(id).or_default().push(span);
                }
                _ => skipped += 1,
            }
        }
        Ok((
            Self {
                label,
                df,
                mapping,
                spans,
                row_days,
            },
            skipped,
        ))
    }

    fn subjects(&self) -> BTreeSet<&SubjectId> {
        self.spans.keys().collect()
    }
}

/// Merged rows of one subject.
struct SubjectRows {
    id: SubjectId,
    joined: Vec<Joined>,
}

/// Intersect two or more time-varying tables.
///
/// Every dataset maps its own start, stop and value columns through
/// [`MergeOptions::sources`]; the id column name is shared. Output rows are
/// sorted by `(id, start)`.
///
/// # Errors
///
/// - [`TvError::Configuration`] for invalid options
/// - [`TvError::MissingColumn`] if a mapped column is absent
/// - [`TvError::IdMismatch`] if subject sets differ and `force` is not set
pub fn tv_merge(datasets: &[&DataFrame], options: &MergeOptions) -> Result<MergeResult> {
    let span = info_span!("tv_merge", datasets = datasets.len());
    let _guard = span.enter();
    let started = Instant::now();

    let value_names = options.resolve(datasets.len())?;
    let mut sink = DiagnosticSink::default();

    let sources = info_span!("read").in_scope(|| -> Result<_> {
        let mut sources = Vec::with_capacity(datasets.len());
        for (index, (df, mapping)) in datasets.iter().zip(&options.sources).enumerate() {
            let (source, skipped) = Source::read(index, df, mapping, &options.id)?;
            if skipped > 0 {
                sink.warn(format!(
                    "{skipped} row(s) of {} with a missing id or invalid interval skipped",
                    source.label
                ));
            }
            sources.push(source);
        }
        Ok(sources)
    })?;

    let common = common_subjects(&sources, options.force, &mut sink)?;

    let work: Vec<(SubjectId, Vec<Vec<Span>>)> = common
        .into_iter()
        .map(|id| {
            let spans = sources
                .iter()
                .map(|source| source.spans.get(&id).cloned().unwrap_or_default())
                .collect();
            (id, spans)
        })
        .collect();

    let merged = info_span!("intersect").in_scope(|| -> Result<Vec<SubjectRows>> {
        let start = Instant::now();
        let merged = run_batched(&work, options.batch_percent, |(id, spans)| {
            Ok(SubjectRows {
                id: id.clone(),
                joined: intersect(spans),
            })
        })?;
        debug!(
            subjects = merged.len(),
            batch_percent = options.batch_percent,
            duration_ms = start.elapsed().as_millis(),
            "intervals intersected"
        );
        Ok(merged)
    })?;

    if options.validatecoverage || options.validateoverlap {
        validate_rows(&merged, options, &mut sink);
    }

    let as_date = sources
        .first()
        .and_then(|source| source.df.column(&source.mapping.start).ok())
        .is_some_and(is_date_column);
    let data = info_span!("write")
        .in_scope(|| write_rows(&merged, &sources, &value_names, options, as_date, &mut sink))?;

    let n_persons = merged.len();
    let n_periods = data.height();
    let summary = MergeSummary {
        n_persons,
        n_periods,
        avg_periods: if n_persons > 0 {
            n_periods as f64 / n_persons as f64
        } else {
            0.0
        },
        max_periods: merged.iter().map(|s| s.joined.len()).max().unwrap_or(0),
        n_datasets: datasets.len(),
        value_columns: value_names,
    };
    info!(
        persons = summary.n_persons,
        periods = summary.n_periods,
        datasets = summary.n_datasets,
        duration_ms = started.elapsed().as_millis(),
        "datasets merged"
    );

    Ok(MergeResult {
        data,
        summary,
        diagnostics: sink.into_vec(),
    })
}

/// Subjects present in every dataset, in id order.
fn common_subjects(
    sources: &[Source<'_>],
    force: bool,
    sink: &mut DiagnosticSink,
) -> Result<Vec<SubjectId>> {
    let mut all: BTreeSet<&SubjectId> = BTreeSet::new();
    for source in sources {
        all.extend(source.spans.keys());
    }
    let sets: Vec<BTreeSet<&SubjectId>> = sources.iter().map(Source::subjects).collect();
    let common: Vec<SubjectId> = all
        .iter()
        .filter(|id| sets.iter().all(|set| set.contains(*id)))
        .map(|id| (*id).clone())
        .collect();

    let missing = all.len() - common.len();
    if missing > 0 {
        if !force {
            return Err(TvError::IdMismatch { missing });
        }
        sink.warn(format!(
            "{missing} subject(s) absent from at least one dataset dropped; {} common subject(s) merged",
            common.len()
        ));
    }
    Ok(common)
}

fn validate_rows(merged: &[SubjectRows], options: &MergeOptions, sink: &mut DiagnosticSink) {
    for subject in merged {
        let bounds: Vec<(Day, Day)> = subject.joined.iter().map(|j| (j.start, j.stop)).collect();
        if options.validatecoverage
            && let Some((after, before)) = find_gap(&bounds)
        {
            sink.push(
                Diagnostic::warning(format!(
                    "merged intervals leave a gap between day {after} and day {before}"
                ))
                .with_subject(subject.id.clone()),
            );
        }
        if options.validateoverlap
            && let Some(day) = find_overlap(&bounds)
        {
            sink.push(
                Diagnostic::warning(format!("merged intervals overlap at day {day}"))
                    .with_subject(subject.id.clone()),
            );
        }
    }
}

fn write_rows(
    merged: &[SubjectRows],
    sources: &[Source<'_>],
    value_names: &[String],
    options: &MergeOptions,
    as_date: bool,
    sink: &mut DiagnosticSink,
) -> Result<DataFrame> {
    let rows: Vec<(&SubjectId, &Joined)> = merged
        .iter()
        .flat_map(|subject| subject.joined.iter().map(move |j| (&subject.id, j)))
        .collect();

    let ids: Vec<SubjectId> = rows.iter().map(|(id, _)| (*id).clone()).collect();
    let starts: Vec<Day> = rows.iter().map(|(_, j)| j.start).collect();
    let stops: Vec<Day> = rows.iter().map(|(_, j)| j.stop).collect();
    let mut columns = vec![
        id_column(&options.id, &ids),
        day_column(&options.startname, &starts, as_date)?,
        day_column(&options.stopname, &stops, as_date)?,
    ];

    for (k, (source, name)) in sources.iter().zip(value_names).enumerate() {
        let source_rows: Vec<Option<usize>> = rows.iter().map(|(_, j)| j.rows.get(k).copied()).collect();
        let value = source.df.column(&source.mapping.value).map_err(table_error)?;
        if source.mapping.continuous {
            let amounts = read_amounts(value)?;
            let scaled: Vec<Option<f64>> = rows
                .iter()
                .zip(&source_rows)
                .map(|((_, joined), row)| {
                    let row = (*row)?;
                    let amount = amounts.get(row).copied().flatten()?;
                    let original = source.row_days.get(row).copied().flatten()?;
                    Some(scale(amount, joined.days(), original))
                })
                .collect();
            columns.push(Column::new(name.as_str().into(), scaled));
        } else {
            columns.push(gather_column(value, &source_rows, name)?);
        }
    }

    for name in &options.keep {
        let mut found = false;
        for (k, source) in sources.iter().enumerate() {
            let Ok(column) = source.df.column(name) else {
                continue;
            };
            found = true;
            let source_rows: Vec<Option<usize>> =
                rows.iter().map(|(_, j)| j.rows.get(k).copied()).collect();
            columns.push(gather_column(column, &source_rows, &format!("{name}_ds{}", k + 1))?);
        }
        if !found {
            sink.push(
                Diagnostic::warning("keep variable not found in any dataset").with_column(name.clone()),
            );
        }
    }

    DataFrame::new(columns).map_err(table_error)
}
