//! Outcome events integrated into an interval table.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use polars::prelude::{Column, DataFrame};
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;
use tracing::{debug, info, info_span};

use tv_model::{Day, EventMode, EventOptions, EventRecord, Result, SubjectId, TvError};

use crate::context::{Diagnostic, DiagnosticSink, Diagnostics};
use crate::events::{Event, Piece, split_at_events};
use crate::frame::{
    day_column, gather_column, id_column, is_date_column, read_amounts, read_days, read_ids,
    require_column, table_error,
};
use crate::intersect::Span;

const INTERVAL_TABLE: &str = "interval table";
const EVENTS_TABLE: &str = "events table";

/// Counts of one `tv_event` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    pub n_rows: usize,
    /// Flagged rows.
    pub n_events: usize,
    pub generate: String,
    pub mode: EventMode,
    /// Label of every event code, 0 being censored.
    pub labels: BTreeMap<i64, String>,
}

/// Result of [`tv_event`].
#[derive(Debug, Clone)]
pub struct EventResult {
    pub data: DataFrame,
    pub summary: EventSummary,
    pub diagnostics: Vec<Diagnostic>,
}

impl Diagnostics for EventResult {
    fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

/// Flag (and split) intervals at outcome events.
///
/// Each events row is resolved to its effective event through competing-risk
/// precedence. Subjects without a qualifying event keep every row with flag 0.
///
/// # Errors
///
/// - [`TvError::Configuration`] for invalid options, or if `generate` already
///   exists and `replace` is not set
/// - [`TvError::MissingColumn`] if a configured column is absent
pub fn tv_event(
    intervals: &DataFrame,
    events: &DataFrame,
    options: &EventOptions,
) -> Result<EventResult> {
    let span = info_span!("tv_event", generate = %options.generate, mode = options.mode.as_str());
    let _guard = span.enter();
    let started = Instant::now();

    options.validate()?;
    if intervals.column(&options.generate).is_ok() && !options.replace {
        return Err(TvError::config(format!(
            "column '{}' already exists in the interval table; set replace to overwrite it",
            options.generate
        )));
    }
    let mut sink = DiagnosticSink::default();

    let (spans, skipped) = read_intervals(intervals, options)?;
    if skipped > 0 {
        sink.warn(format!(
            "{skipped} interval row(s) with a missing id or invalid interval dropped"
        ));
    }
    for name in &options.continuous {
        require_column(intervals, INTERVAL_TABLE, name)?;
    }

    let subject_events = read_events(events, options)?;
    if subject_events.is_empty() {
        sink.warn("no usable event dates; every interval is censored");
    }

    let work: Vec<(&SubjectId, &Vec<Span>)> = spans.iter().collect();
    let pieces = info_span!("split").in_scope(|| {
        let start = Instant::now();
        let pieces: Vec<Vec<Piece>> = work
            .par_iter()
            .map(|(id, spans)| {
                let events = subject_events.get(*id).cloned().unwrap_or_default();
                split_at_events(spans, events, options.mode)
            })
            .collect();
        let pieces: Vec<(SubjectId, Piece)> = work
            .iter()
            .zip(pieces)
            .flat_map(|((id, _), pieces)| pieces.into_iter().map(move |p| ((*id).clone(), p)))
            .collect();
        debug!(
            rows = pieces.len(),
            duration_ms = start.elapsed().as_millis(),
            "intervals split at events"
        );
        pieces
    });

    let data = info_span!("write")
        .in_scope(|| write_pieces(intervals, events, &pieces, options, &mut sink))?;

    let n_events = pieces.iter().filter(|(_, piece)| piece.flag > 0).count();
    let summary = EventSummary {
        n_rows: data.height(),
        n_events,
        generate: options.generate.clone(),
        mode: options.mode,
        labels: options.labels(),
    };
    info!(
        rows = summary.n_rows,
        events = summary.n_events,
        duration_ms = started.elapsed().as_millis(),
        "events integrated"
    );

    Ok(EventResult {
        data,
        summary,
        diagnostics: sink.into_vec(),
    })
}

/// Interval rows by subject, and the number of unusable rows.
fn read_intervals(
    df: &DataFrame,
    options: &EventOptions,
) -> Result<(BTreeMap<SubjectId, Vec<Span>>, usize)> {
    let ids = read_ids(require_column(df, INTERVAL_TABLE, &options.columns.id)?)?;
    let starts = read_days(require_column(df, INTERVAL_TABLE, &options.startvar)?)?;
    let stops = read_days(require_column(df, INTERVAL_TABLE, &options.stopvar)?)?;

    let mut spans: BTreeMap<SubjectId, Vec<Span>> = BTreeMap::new();
    let mut skipped = 0;
    for (row, ((id, start), stop)) in ids.into_iter().zip(starts).zip(stops).enumerate() {
        match (id, start, stop) {
            (Some(id), Some(start), Some(stop)) if start <= stop => {
                spans.entry(id).or_default().push(Span::new(start, stop, row));
            }
            _ => skipped += 1,
        }
    }
    Ok((spans, skipped))
}

/// Effective events by subject.
fn read_events(df: &DataFrame, options: &EventOptions) -> Result<BTreeMap<SubjectId, Vec<Event>>> {
    let columns = &options.columns;
    let ids = read_ids(require_column(df, EVENTS_TABLE, &columns.id)?)?;
    let primary = read_days(require_column(df, EVENTS_TABLE, &columns.date)?)?;
    let competing = columns
        .compete
        .iter()
        .map(|name| read_days(require_column(df, EVENTS_TABLE, name)?))
        .collect::<Result<Vec<Vec<Option<Day>>>>>()?;

    let mut by_subject: BTreeMap<SubjectId, Vec<Event>> = BTreeMap::new();
    for (row, (id, date)) in ids.into_iter().zip(primary).enumerate() {
        let Some(id) = id else { continue };
        let dates = competing.iter().map(|column| column[row]).collect();
        let record = EventRecord::new(id, date, dates).with_row(row);
        if let Some((date, code)) = record.effective() {
            by_subject
                .entry(record.subject)
                .or_default()
                .push(Event { date, code, row });
        }
    }
    Ok(by_subject)
}

fn write_pieces(
    intervals: &DataFrame,
    events: &DataFrame,
    pieces: &[(SubjectId, Piece)],
    options: &EventOptions,
    sink: &mut DiagnosticSink,
) -> Result<DataFrame> {
    let source_rows: Vec<Option<usize>> = pieces.iter().map(|(_, p)| Some(p.source)).collect();
    let starts: Vec<Day> = pieces.iter().map(|(_, p)| p.start).collect();
    let stops: Vec<Day> = pieces.iter().map(|(_, p)| p.stop).collect();
    let continuous: BTreeSet<&str> = options.continuous.iter().map(String::as_str).collect();

    let mut columns = Vec::with_capacity(intervals.width() + 2 + options.keepvars.len());
    for column in intervals.get_columns() {
        let name = column.name().as_str();
        if name == options.generate || options.timegen.as_deref() == Some(name) {
            continue;
        }
        if name == options.columns.id {
            let ids: Vec<SubjectId> = pieces.iter().map(|(id, _)| id.clone()).collect();
            columns.push(id_column(name, &ids));
        } else if name == options.startvar {
            columns.push(day_column(name, &starts, is_date_column(column))?);
        } else if name == options.stopvar {
            columns.push(day_column(name, &stops, is_date_column(column))?);
        } else if continuous.contains(name) {
            let amounts = read_amounts(column)?;
            let scaled: Vec<Option<f64>> = pieces
                .iter()
                .map(|(_, piece)| {
                    amounts
                        .get(piece.source)
                        .copied()
                        .flatten()
                        .map(|amount| amount * piece.fraction)
                })
                .collect();
            columns.push(Column::new(name.into(), scaled));
        } else {
            columns.push(gather_column(column, &source_rows, name)?);
        }
    }

    let flags: Vec<i64> = pieces.iter().map(|(_, p)| p.flag).collect();
    columns.push(Column::new(options.generate.as_str().into(), flags));

    if let Some(timegen) = &options.timegen {
        let per_unit = options.timeunit.days_per_unit();
        let durations: Vec<f64> = pieces
            .iter()
            .map(|(_, p)| (i64::from(p.stop) - i64::from(p.start) + 1) as f64 / per_unit)
            .collect();
        columns.push(Column::new(timegen.as_str().into(), durations));
    }

    let event_rows: Vec<Option<usize>> = pieces.iter().map(|(_, p)| p.event_row).collect();
    for name in &options.keepvars {
        if columns.iter().any(|column| column.name().as_str() == name) {
            sink.push(
                Diagnostic::warning("keep variable collides with an output column; skipped")
                    .with_column(name.clone()),
            );
            continue;
        }
        match events.column(name) {
            Ok(source) => columns.push(gather_column(source, &event_rows, name)?),
            Err(_) => sink.push(
                Diagnostic::warning("keep variable not found in the events table")
                    .with_column(name.clone()),
            ),
        }
    }

    DataFrame::new(columns).map_err(table_error)
}
