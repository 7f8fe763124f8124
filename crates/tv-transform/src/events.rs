//! Splitting one subject's intervals at event dates.

use tv_model::{Day, EventMode};

use crate::intersect::Span;

/// Resolved event of one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub date: Day,
    pub code: i64,
    /// Row in the events table.
    pub row: usize,
}

/// One output row produced from an input interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub start: Day,
    pub stop: Day,
    /// Row in the interval table this piece was cut from.
    pub source: usize,
    /// Event code, 0 when censored.
    pub flag: i64,
    /// Events-table row of the event flagging this piece.
    pub event_row: Option<usize>,
    /// Share of the source interval's days.
    pub fraction: f64,
}

/// Sort by date and keep one event per date (lowest code).
fn prepare(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by_key(|event| (event.date, event.code, event.row));
    events.dedup_by_key(|event| event.date);
    events
}

/// True when `date` flags the interval `[start, stop]`.
///
/// An event flags the interval it ends, never the one it starts: a date on
/// `stop` flags, a date on `start` of a longer interval does not.
fn flags(span: &Span, date: Day) -> bool {
    date == span.stop || (span.start < date && date < span.stop)
}

/// Split the intervals of one subject at its events.
///
/// An event strictly inside an interval cuts it into `[start, date]`, which
/// carries the event, and `[date + 1, stop]`. In single mode the subject is
/// censored at the first flagged interval and later rows are dropped; events
/// that flag no interval (before entry, in a gap, on a start day) never
/// censor.
pub fn split_at_events(spans: &[Span], events: Vec<Event>, mode: EventMode) -> Vec<Piece> {
    let events = prepare(events);
    let mut sorted: Vec<Span> = spans.to_vec();
    sorted.sort_by_key(|span| (span.start, span.stop));

    let mut pieces = Vec::with_capacity(sorted.len() + events.len());
    let mut censored_at: Option<Day> = None;
    for span in &sorted {
        let total = span.days() as f64;
        let mut from = span.start;
        for event in events.iter().filter(|event| flags(span, event.date)) {
            pieces.push(Piece {
                start: from,
                stop: event.date,
                source: span.row,
                flag: event.code,
                event_row: Some(event.row),
                fraction: (i64::from(event.date) - i64::from(from) + 1) as f64 / total,
            });
            censored_at.get_or_insert(event.date);
            from = event.date + 1;
        }
        if from <= span.stop {
            pieces.push(Piece {
                start: from,
                stop: span.stop,
                source: span.row,
                flag: 0,
                event_row: None,
                fraction: (i64::from(span.stop) - i64::from(from) + 1) as f64 / total,
            });
        }
    }

    if mode == EventMode::Single
        && let Some(date) = censored_at
    {
        pieces.retain(|piece| piece.stop <= date);
    }
    pieces
}
