//! N-way intersection of per-subject interval sets.

use tv_model::Day;

/// An interval of one source table, with the row it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Day,
    pub stop: Day,
    pub row: usize,
}

impl Span {
    pub fn new(start: Day, stop: Day, row: usize) -> Self {
        Self { start, stop, row }
    }

    pub fn days(&self) -> i64 {
        i64::from(self.stop) - i64::from(self.start) + 1
    }
}

/// A narrowed interval and, per source in order, the row it overlaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub start: Day,
    pub stop: Day,
    pub rows: Vec<usize>,
}

impl Joined {
    pub fn days(&self) -> i64 {
        i64::from(self.stop) - i64::from(self.start) + 1
    }
}

/// Intersect the span sets of one subject, first with second, the result
/// with third, and so on.
///
/// Two spans intersect when `max(start) <= min(stop)`. Output is sorted by
/// start, then stop.
pub fn intersect(sources: &[Vec<Span>]) -> Vec<Joined> {
    let Some((first, rest)) = sources.split_first() else {
        return Vec::new();
    };
    let mut joined: Vec<Joined> = first
        .iter()
        .map(|span| Joined {
            start: span.start,
            stop: span.stop,
            rows: vec![span.row],
        })
        .collect();

    for spans in rest {
        let mut sorted: Vec<Span> = spans.clone();
        sorted.sort_by_key(|span| (span.start, span.stop));

        let mut next = Vec::with_capacity(joined.len().max(sorted.len()));
        for current in &joined {
            for span in &sorted {
                if span.start > current.stop {
                    break;
                }
                let start = current.start.max(span.start);
                let stop = current.stop.min(span.stop);
                if start > stop {
                    continue;
                }
                let mut rows = current.rows.clone();
                rows.push(span.row);
                next.push(Joined { start, stop, rows });
            }
        }
        joined = next;
    }

    joined.sort_by(|a, b| a.start.cmp(&b.start).then(a.stop.cmp(&b.stop)));
    joined
}

/// Scale a value measured over `original_days` to `narrowed_days`.
pub fn scale(value: f64, narrowed_days: i64, original_days: i64) -> f64 {
    if original_days <= 0 {
        return value;
    }
    value * narrowed_days as f64 / original_days as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_way() {
        let a = vec![Span::new(0, 99, 0), Span::new(100, 199, 1)];
        let b = vec![Span::new(0, 149, 0), Span::new(150, 199, 1)];
        let out = intersect(&[a, b]);
        let bounds: Vec<(Day, Day)> = out.iter().map(|j| (j.start, j.stop)).collect();
        assert_eq!(bounds, vec![(0, 99), (100, 149), (150, 199)]);
        assert_eq!(out[1].rows, vec![1, 0]);
    }

    #[test]
    fn test_three_way_narrows_to_common_window() {
        let a = vec![Span::new(0, 199, 0)];
        let b = vec![Span::new(50, 249, 0)];
        let c = vec![Span::new(20, 79, 0), Span::new(80, 120, 1)];
        let out = intersect(&[a, b, c]);
        let bounds: Vec<(Day, Day)> = out.iter().map(|j| (j.start, j.stop)).collect();
        assert_eq!(bounds, vec![(50, 79), (80, 120)]);
        assert_eq!(out[1].rows, vec![0, 0, 1]);
    }

    #[test]
    fn test_disjoint_sources_give_nothing() {
        let out = intersect(&[vec![Span::new(0, 9, 0)], vec![Span::new(10, 19, 0)]]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_scale() {
        assert!((scale(100.0, 25, 100) - 25.0).abs() < 1e-9);
        assert!((scale(7.0, 3, 0) - 7.0).abs() < 1e-9);
    }
}
