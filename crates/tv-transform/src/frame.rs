//! Reading and writing polars tables through explicit column names.

use polars::prelude::{
    AnyValue, Column, DataFrame, DataType, IdxCa, IdxSize, NewChunkedArray, PolarsError,
};

use tv_common::{any_to_day, any_to_f64, any_to_i64};
use tv_model::{Day, Result, SubjectId, TvError};

pub(crate) fn table_error(error: PolarsError) -> TvError {
    TvError::Table(error.to_string())
}

/// Look up a configured column, failing with a schema error.
pub(crate) fn require_column<'a>(df: &'a DataFrame, table: &str, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| TvError::missing_column(table, name))
}

pub(crate) fn is_date_column(column: &Column) -> bool {
    matches!(column.dtype(), DataType::Date | DataType::Datetime(_, _))
}

fn read_with<T>(column: &Column, convert: impl Fn(AnyValue<'_>) -> Option<T>) -> Result<Vec<Option<T>>> {
    let mut values = Vec::with_capacity(column.len());
    for idx in 0..column.len() {
        let value = column.get(idx).map_err(table_error)?;
        values.push(convert(value));
    }
    Ok(values)
}

/// Subject ids: integers (and integral floats) become `Int`, trimmed
/// non-empty strings become `Text`.
pub(crate) fn any_to_subject_id(value: AnyValue<'_>) -> Option<SubjectId> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => text_id(s),
        AnyValue::StringOwned(s) => text_id(&s),
        AnyValue::Float32(v) => integral(f64::from(v)),
        AnyValue::Float64(v) => integral(v),
        AnyValue::Boolean(_) => None,
        other => any_to_i64(other).map(SubjectId::Int),
    }
}

fn text_id(value: &str) -> Option<SubjectId> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| SubjectId::Text(trimmed.to_string()))
}

fn integral(value: f64) -> Option<SubjectId> {
    (value.is_finite() && value.fract() == 0.0).then_some(SubjectId::Int(value as i64))
}

pub(crate) fn read_ids(column: &Column) -> Result<Vec<Option<SubjectId>>> {
    read_with(column, any_to_subject_id)
}

pub(crate) fn read_days(column: &Column) -> Result<Vec<Option<Day>>> {
    read_with(column, any_to_day)
}

pub(crate) fn read_codes(column: &Column) -> Result<Vec<Option<i64>>> {
    read_with(column, any_to_i64)
}

pub(crate) fn read_amounts(column: &Column) -> Result<Vec<Option<f64>>> {
    read_with(column, any_to_f64)
}

/// Id column typed `Int64` when every id is an integer, `String` otherwise.
pub(crate) fn id_column(name: &str, ids: &[SubjectId]) -> Column {
    if ids.iter().all(SubjectId::is_int) {
        let values: Vec<Option<i64>> = ids.iter().map(SubjectId::as_int).collect();
        Column::new(name.into(), values)
    } else {
        let values: Vec<String> = ids.iter().map(ToString::to_string).collect();
        Column::new(name.into(), values)
    }
}

/// Day column written as polars `Date` or as `Int64` day numbers.
pub(crate) fn day_column(name: &str, days: &[Day], as_date: bool) -> Result<Column> {
    if as_date {
        let column = Column::new(name.into(), days.to_vec());
        column.cast(&DataType::Date).map_err(table_error)
    } else {
        let values: Vec<i64> = days.iter().map(|day| i64::from(*day)).collect();
        Ok(Column::new(name.into(), values))
    }
}

/// Gather `rows` of `column` (null where the row is `None`) under a new name.
pub(crate) fn gather_column(column: &Column, rows: &[Option<usize>], name: &str) -> Result<Column> {
    let mut indices = Vec::with_capacity(rows.len());
    for row in rows {
        let index = match row {
            Some(row) => Some(
                IdxSize::try_from(*row)
                    .map_err(|_| TvError::Table(format!("row {row} exceeds the index range")))?,
            ),
            None => None,
        };
        indices.push(index);
    }
    let indices = IdxCa::from_iter_options(name.into(), indices.into_iter());
    let gathered = column.take(&indices).map_err(table_error)?;
    Ok(gathered.with_name(name.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_id_coercion() {
        assert_eq!(any_to_subject_id(AnyValue::Int32(7)), Some(SubjectId::Int(7)));
        assert_eq!(any_to_subject_id(AnyValue::Float64(7.0)), Some(SubjectId::Int(7)));
        assert_eq!(any_to_subject_id(AnyValue::Float64(7.5)), None);
        assert_eq!(
            any_to_subject_id(AnyValue::String(" P01 ")),
            Some(SubjectId::Text("P01".to_string()))
        );
        assert_eq!(any_to_subject_id(AnyValue::String("  ")), None);
        assert_eq!(any_to_subject_id(AnyValue::Null), None);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let df = DataFrame::new(vec![Column::new("id".into(), vec![1_i64, 2])]).unwrap();
        let err = require_column(&df, "subjects", "entry").unwrap_err();
        assert!(matches!(err, TvError::MissingColumn { .. }));
    }

    #[test]
    fn test_id_column_types() {
        let ints = id_column("id", &[SubjectId::Int(1), SubjectId::Int(2)]);
        assert_eq!(ints.dtype(), &DataType::Int64);
        let mixed = id_column("id", &[SubjectId::Int(1), SubjectId::from("b")]);
        assert_eq!(mixed.dtype(), &DataType::String);
    }

    #[test]
    fn test_day_column_as_date_round_trips() {
        let column = day_column("start", &[18262, 18263], true).unwrap();
        assert!(is_date_column(&column));
        assert_eq!(read_days(&column).unwrap(), vec![Some(18262), Some(18263)]);
    }

    #[test]
    fn test_gather_with_nulls() {
        let source = Column::new("bmi".into(), vec![20.5_f64, 31.0]);
        let gathered = gather_column(&source, &[Some(1), None, Some(0)], "bmi_ds1").unwrap();
        assert_eq!(gathered.name().as_str(), "bmi_ds1");
        assert_eq!(
            read_amounts(&gathered).unwrap(),
            vec![Some(31.0), None, Some(20.5)]
        );
    }
}
