//! Integration tests for time-varying exposure construction.

use chrono::NaiveDate;
use polars::prelude::{AnyValue, Column, DataFrame, DataType};

use tv_common::{any_to_day, any_to_f64, date_to_day, format_day};
use tv_model::{ExposeColumns, ExposeOptions, Grace, TimeUnit, TvError};
use tv_transform::{Diagnostics, tv_expose};

fn day(text: &str) -> i32 {
    date_to_day(NaiveDate::parse_from_str(text, "%Y-%m-%d").unwrap())
}

fn date_column(name: &str, dates: &[&str]) -> Column {
    let days: Vec<i32> = dates.iter().map(|d| day(d)).collect();
    Column::new(name.into(), days).cast(&DataType::Date).unwrap()
}

fn subjects(rows: &[(i64, &str, &str)]) -> DataFrame {
    DataFrame::new(vec![
        Column::new("id".into(), rows.iter().map(|r| r.0).collect::<Vec<_>>()),
        date_column("entry", &rows.iter().map(|r| r.1).collect::<Vec<_>>()),
        date_column("exit", &rows.iter().map(|r| r.2).collect::<Vec<_>>()),
    ])
    .unwrap()
}

fn exposures(rows: &[(i64, &str, &str, i64)]) -> DataFrame {
    DataFrame::new(vec![
        Column::new("id".into(), rows.iter().map(|r| r.0).collect::<Vec<_>>()),
        date_column("start", &rows.iter().map(|r| r.1).collect::<Vec<_>>()),
        date_column("stop", &rows.iter().map(|r| r.2).collect::<Vec<_>>()),
        Column::new("exposure".into(), rows.iter().map(|r| r.3).collect::<Vec<_>>()),
    ])
    .unwrap()
}

fn text(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.to_string(),
    }
}

/// One line per row: id, start, stop, value.
fn render(df: &DataFrame, value: &str) -> String {
    let ids = df.column("id").unwrap();
    let starts = df.column("start").unwrap();
    let stops = df.column("stop").unwrap();
    let values = df.column(value).unwrap();
    (0..df.height())
        .map(|i| {
            format!(
                "{} {} {} {}",
                text(ids.get(i).unwrap()),
                format_day(any_to_day(starts.get(i).unwrap()).unwrap()),
                format_day(any_to_day(stops.get(i).unwrap()).unwrap()),
                text(values.get(i).unwrap()),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn single_exposure_in_leap_year() {
    let result = tv_expose(
        &subjects(&[(1, "2020-01-01", "2020-12-31")]),
        &exposures(&[(1, "2020-03-01", "2020-06-30", 1)]),
        &ExposeOptions::default(),
    )
    .unwrap();

    insta::assert_snapshot!(render(&result.data, "tv_exposure"), @r"
    1 2020-01-01 2020-02-29 0
    1 2020-03-01 2020-06-30 1
    1 2020-07-01 2020-12-31 0
    ");
    assert_eq!(result.summary.total_time, 366);
    assert_eq!(result.summary.n_periods, 3);
    assert!(result.diagnostics().is_empty());
    assert_eq!(
        result.data.column("start").unwrap().dtype(),
        &DataType::Date
    );
}

#[test]
fn layer_without_resumption() {
    let result = tv_expose(
        &subjects(&[(1, "2020-01-01", "2020-12-31")]),
        &exposures(&[
            (1, "2020-01-01", "2020-06-30", 1),
            (1, "2020-04-01", "2020-09-30", 2),
        ]),
        &ExposeOptions::default().with_layer(),
    )
    .unwrap();

    insta::assert_snapshot!(render(&result.data, "tv_exposure"), @r"
    1 2020-01-01 2020-03-31 1
    1 2020-04-01 2020-09-30 2
    1 2020-10-01 2020-12-31 0
    ");
}

#[test]
fn grace_bridges_only_gaps_it_covers() {
    // 15 uncovered days between the two periods.
    let inputs = exposures(&[
        (1, "2020-01-01", "2020-01-31", 1),
        (1, "2020-02-16", "2020-03-31", 1),
    ]);
    let window = subjects(&[(1, "2020-01-01", "2020-03-31")]);

    let strict = tv_expose(
        &window,
        &inputs,
        &ExposeOptions::default().with_grace(Grace::Uniform(14)),
    )
    .unwrap();
    assert_eq!(strict.data.height(), 3);

    let bridged = tv_expose(
        &window,
        &inputs,
        &ExposeOptions::default().with_grace(Grace::Uniform(15)),
    )
    .unwrap();
    insta::assert_snapshot!(render(&bridged.data, "tv_exposure"), @"1 2020-01-01 2020-03-31 1");
}

#[test]
fn subjects_without_records_get_reference_window() {
    let result = tv_expose(
        &subjects(&[(1, "2020-01-01", "2020-01-31"), (2, "2020-02-01", "2020-02-29")]),
        &exposures(&[(1, "2020-01-10", "2020-01-20", 3)]),
        &ExposeOptions::default(),
    )
    .unwrap();

    insta::assert_snapshot!(render(&result.data, "tv_exposure"), @r"
    1 2020-01-01 2020-01-09 0
    1 2020-01-10 2020-01-20 3
    1 2020-01-21 2020-01-31 0
    2 2020-02-01 2020-02-29 0
    ");
    assert_eq!(result.summary.n_persons, 2);
}

#[test]
fn unknown_subject_fails_unless_best_effort() {
    let window = subjects(&[(1, "2020-01-01", "2020-12-31")]);
    let inputs = exposures(&[
        (1, "2020-03-01", "2020-03-31", 1),
        (9, "2020-03-01", "2020-03-31", 1),
    ]);

    let err = tv_expose(&window, &inputs, &ExposeOptions::default()).unwrap_err();
    assert!(matches!(err, TvError::UnmatchedSubjects { count: 1 }));

    let result = tv_expose(&window, &inputs, &ExposeOptions::default().with_best_effort()).unwrap();
    assert_eq!(result.summary.unmatched_records, 1);
    assert_eq!(result.warning_count(), 1);
}

#[test]
fn missing_column_is_reported() {
    let window = subjects(&[(1, "2020-01-01", "2020-12-31")]);
    let inputs = exposures(&[(1, "2020-03-01", "2020-03-31", 1)]);
    let options = ExposeOptions::new(ExposeColumns::default().with_exposure("atc"));

    let err = tv_expose(&window, &inputs, &options).unwrap_err();
    assert!(matches!(err, TvError::MissingColumn { ref column, .. } if column == "atc"));
}

#[test]
fn conflicting_definitions_rejected() {
    let window = subjects(&[(1, "2020-01-01", "2020-12-31")]);
    let inputs = exposures(&[(1, "2020-03-01", "2020-03-31", 1)]);
    let err = tv_expose(
        &window,
        &inputs,
        &ExposeOptions::default().with_evertreated().with_currentformer(),
    )
    .unwrap_err();
    assert!(matches!(err, TvError::Configuration(_)));
}

#[test]
fn evertreated_with_patterns() {
    let result = tv_expose(
        &subjects(&[(1, "2020-01-01", "2020-12-31")]),
        &exposures(&[
            (1, "2020-03-01", "2020-03-31", 1),
            (1, "2020-06-01", "2020-06-30", 2),
        ]),
        &ExposeOptions::default()
            .with_evertreated()
            .with_switching(true)
            .with_statetime(),
    )
    .unwrap();

    insta::assert_snapshot!(render(&result.data, "tv_exposure"), @r"
    1 2020-01-01 2020-02-29 0
    1 2020-03-01 2020-12-31 1
    ");
    let pattern = result.data.column("switching_pattern").unwrap();
    assert_eq!(text(pattern.get(0).unwrap()), "0->1");
    let switched = result.data.column("has_switched").unwrap();
    assert_eq!(switched.get(1).unwrap(), AnyValue::Int64(1));
    let statetime = result.data.column("statetime").unwrap();
    assert_eq!(statetime.get(1).unwrap(), AnyValue::Int64(306));
}

#[test]
fn continuous_exposure_in_days() {
    let result = tv_expose(
        &subjects(&[(1, "2020-01-01", "2020-01-31")]),
        &exposures(&[(1, "2020-01-11", "2020-01-20", 1)]),
        &ExposeOptions::default().with_continuous(TimeUnit::Days),
    )
    .unwrap();

    let values = result.data.column("tv_exposure").unwrap();
    assert_eq!(values.dtype(), &DataType::Float64);
    let cumulative: Vec<f64> = (0..values.len())
        .filter_map(|i| any_to_f64(values.get(i).unwrap()))
        .collect();
    assert_eq!(cumulative, vec![0.0, 10.0, 10.0]);
}

#[test]
fn split_combinations_written_as_text() {
    let result = tv_expose(
        &subjects(&[(1, "2020-01-01", "2020-01-31")]),
        &exposures(&[
            (1, "2020-01-01", "2020-01-20", 1),
            (1, "2020-01-11", "2020-01-31", 2),
        ]),
        &ExposeOptions::default().with_split(),
    )
    .unwrap();

    let combination = result.data.column("tv_exposure_combination").unwrap();
    let texts: Vec<String> = (0..combination.len())
        .map(|i| text(combination.get(i).unwrap()))
        .collect();
    assert_eq!(texts, vec!["", "1+2", ""]);
    let codes = result.data.column("tv_exposure").unwrap();
    assert_eq!(codes.get(1).unwrap(), AnyValue::Null);
}

#[test]
fn keepvars_and_coverage() {
    let mut window = subjects(&[(1, "2020-01-01", "2020-03-31")]);
    window
        .with_column(Column::new("sex".into(), vec!["F"]))
        .unwrap();
    let result = tv_expose(
        &window,
        &exposures(&[(1, "2020-02-01", "2020-02-10", 1)]),
        &ExposeOptions::default()
            .with_keepvars(vec!["sex".to_string(), "bmi".to_string()])
            .with_keepdates()
            .with_validation(),
    )
    .unwrap();

    let sex = result.data.column("sex").unwrap();
    assert_eq!(text(sex.get(2).unwrap()), "F");
    assert!(result.data.column("entry").is_ok());
    assert_eq!(result.warning_count(), 1);
    assert_eq!(result.coverage.len(), 1);
    assert!(result.coverage[0].is_complete());
}

#[test]
fn fractional_exposure_code_is_dropped() {
    let records = DataFrame::new(vec![
        Column::new("id".into(), vec![1_i64, 1]),
        date_column("start", &["2020-01-11", "2020-01-21"]),
        date_column("stop", &["2020-01-20", "2020-01-30"]),
        Column::new("exposure".into(), vec![1.0_f64, 1.7]),
    ])
    .unwrap();
    let result = tv_expose(
        &subjects(&[(1, "2020-01-01", "2020-04-09")]),
        &records,
        &ExposeOptions::default(),
    )
    .unwrap();

    insta::assert_snapshot!(render(&result.data, "tv_exposure"), @r"
    1 2020-01-01 2020-01-10 0
    1 2020-01-11 2020-01-20 1
    1 2020-01-21 2020-04-09 0
    ");
    assert_eq!(result.summary.dropped_records, 1);
    assert_eq!(result.warning_count(), 1);
}

#[test]
fn current_former_by_type() {
    let result = tv_expose(
        &subjects(&[
            (1, "2020-01-01", "2020-12-31"),
            (2, "2020-01-01", "2020-12-31"),
        ]),
        &exposures(&[
            (1, "2020-03-01", "2020-03-31", 1),
            (1, "2020-06-01", "2020-06-30", 2),
            (2, "2020-02-01", "2020-02-29", 2),
        ]),
        &ExposeOptions::default().with_currentformer().with_bytype(),
    )
    .unwrap();

    let cf1 = result.data.column("cf1").unwrap();
    let cf2 = result.data.column("cf2").unwrap();
    let rows: Vec<String> = render(&result.data, "tv_exposure")
        .lines()
        .enumerate()
        .map(|(i, line)| {
            format!(
                "{line} {} {}",
                text(cf1.get(i).unwrap()),
                text(cf2.get(i).unwrap())
            )
        })
        .collect();
    insta::assert_snapshot!(rows.join("\n"), @r"
    1 2020-01-01 2020-02-29 0 0 0
    1 2020-03-01 2020-03-31 1 1 0
    1 2020-04-01 2020-05-31 2 2 0
    1 2020-06-01 2020-06-30 1 2 1
    1 2020-07-01 2020-12-31 2 2 2
    2 2020-01-01 2020-01-31 0 0 0
    2 2020-02-01 2020-02-29 1 0 1
    2 2020-03-01 2020-12-31 2 0 2
    ");
}

#[test]
fn by_type_columns_follow_generate_name() {
    let result = tv_expose(
        &subjects(&[(1, "2020-01-01", "2020-12-31")]),
        &exposures(&[(1, "2020-03-01", "2020-06-30", 3)]),
        &ExposeOptions::default()
            .with_evertreated()
            .with_bytype()
            .with_generate("statin"),
    )
    .unwrap();

    let names: Vec<&str> = result
        .data
        .get_column_names()
        .into_iter()
        .map(|name| name.as_str())
        .collect();
    assert_eq!(names, ["id", "start", "stop", "statin", "statin3"]);
    assert!(
        tv_expose(
            &subjects(&[(1, "2020-01-01", "2020-12-31")]),
            &exposures(&[]),
            &ExposeOptions::default().with_bytype(),
        )
        .is_err()
    );
}
