//! User-facing options and the validated plans they resolve to.
//!
//! Options mirror the flags a caller sets. Each options struct is validated
//! once at call entry and turned into a tagged plan; the engine stages only
//! ever see the plan.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TvError};
use crate::value::ExposureValue;

// =============================================================================
// Time units
// =============================================================================

/// Calendar unit used for cumulative measures, cutpoints and durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Days,
    Weeks,
    Months,
    Quarters,
    Years,
}

impl TimeUnit {
    /// Length of one unit in days (365.25-day year, 30.4375-day month).
    pub fn days_per_unit(self) -> f64 {
        match self {
            Self::Days => 1.0,
            Self::Weeks => 7.0,
            Self::Months => 365.25 / 12.0,
            Self::Quarters => 365.25 / 4.0,
            Self::Years => 365.25,
        }
    }

    /// Whole-day chunk length used when expanding intervals by unit.
    pub fn chunk_days(self) -> i32 {
        match self {
            Self::Days => 1,
            Self::Weeks => 7,
            Self::Months => 30,
            Self::Quarters => 91,
            Self::Years => 365,
        }
    }

    /// Convert a day count into this unit.
    pub fn from_days(self, days: f64) -> f64 {
        days / self.days_per_unit()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Days => "days",
            Self::Weeks => "weeks",
            Self::Months => "months",
            Self::Quarters => "quarters",
            Self::Years => "years",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = TvError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" | "days" => Ok(Self::Days),
            "week" | "weeks" => Ok(Self::Weeks),
            "month" | "months" => Ok(Self::Months),
            "quarter" | "quarters" => Ok(Self::Quarters),
            "year" | "years" => Ok(Self::Years),
            other => Err(TvError::config(format!("unknown time unit '{other}'"))),
        }
    }
}

// =============================================================================
// Grace
// =============================================================================

/// Maximum gap in days still bridged between two exposure intervals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grace {
    /// Same threshold for every exposure value.
    Uniform(i32),
    /// Threshold looked up by the code of the interval preceding the gap.
    ByValue {
        default: i32,
        values: BTreeMap<i64, i32>,
    },
}

impl Default for Grace {
    fn default() -> Self {
        Self::Uniform(0)
    }
}

impl Grace {
    /// Grace in days after an interval carrying `value`.
    pub fn days_after(&self, value: &ExposureValue) -> i32 {
        match self {
            Self::Uniform(days) => *days,
            Self::ByValue { default, values } => value
                .code()
                .and_then(|code| values.get(&code).copied())
                .unwrap_or(*default),
        }
    }

    /// Largest threshold configured for any value.
    pub fn max_days(&self) -> i32 {
        match self {
            Self::Uniform(days) => *days,
            Self::ByValue { default, values } => {
                values.values().copied().fold(*default, i32::max)
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let negative = match self {
            Self::Uniform(days) => *days < 0,
            Self::ByValue { default, values } => *default < 0 || values.values().any(|d| *d < 0),
        };
        if negative {
            return Err(TvError::config("grace must not be negative"));
        }
        Ok(())
    }
}

impl fmt::Display for Grace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform(days) => write!(f, "{days}"),
            Self::ByValue { default, values } => {
                let parts: Vec<String> = values.iter().map(|(k, v)| format!("{k}={v}")).collect();
                write!(f, "{} (default {default})", parts.join(" "))
            }
        }
    }
}

// =============================================================================
// Exposure construction
// =============================================================================

/// Column names for the subjects and exposure tables.
///
/// Both tables share the `id` column name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposeColumns {
    pub id: String,
    pub start: String,
    /// Ignored for point-in-time exposures.
    pub stop: String,
    pub exposure: String,
    pub entry: String,
    pub exit: String,
}

impl Default for ExposeColumns {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            start: "start".to_string(),
            stop: "stop".to_string(),
            exposure: "exposure".to_string(),
            entry: "entry".to_string(),
            exit: "exit".to_string(),
        }
    }
}

impl ExposeColumns {
    pub fn with_id(mut self, name: impl Into<String>) -> Self {
        self.id = name.into();
        self
    }

    pub fn with_period(mut self, start: impl Into<String>, stop: impl Into<String>) -> Self {
        self.start = start.into();
        self.stop = stop.into();
        self
    }

    pub fn with_exposure(mut self, name: impl Into<String>) -> Self {
        self.exposure = name.into();
        self
    }

    pub fn with_window(mut self, entry: impl Into<String>, exit: impl Into<String>) -> Self {
        self.entry = entry.into();
        self.exit = exit.into();
        self
    }
}

/// Options for building a time-varying exposure table.
///
/// At most one exposure definition may be requested: `evertreated`,
/// `currentformer`, `continuousunit`/`duration`, `recency` or `dose`.
/// Without any of them the resolved exposure codes are reported as they are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposeOptions {
    pub columns: ExposeColumns,
    /// Code meaning "unexposed".
    pub reference: i64,

    pub evertreated: bool,
    pub currentformer: bool,
    /// Cumulative exposure unit; alone it requests continuous output.
    pub continuousunit: Option<TimeUnit>,
    /// Cutpoints for cumulative-duration buckets, in `continuousunit`.
    pub duration: Option<Vec<f64>>,
    /// Cutpoints for time since last exposure, in `recency_unit`.
    pub recency: Option<Vec<f64>>,
    pub recency_unit: Option<TimeUnit>,
    /// Treat the exposure column as a dose amount.
    pub dose: bool,
    pub dosecuts: Option<Vec<f64>>,
    /// Chunk continuous output into periods of this unit.
    pub expandunit: Option<TimeUnit>,
    /// One extra status column per exposure code (ever-treated and
    /// current/former only).
    pub bytype: bool,

    /// Overlap ranking, highest priority first.
    pub priority: Option<Vec<i64>>,
    pub split: bool,
    pub layer: bool,

    pub grace: Grace,
    /// Same-value periods closer than this are merged.
    pub merge_days: i32,
    pub lag: i32,
    pub washout: i32,
    /// Keep only records lasting between `min` and `max` days.
    pub window: Option<(i32, i32)>,
    pub carryforward: i32,
    pub fillgaps: i32,
    /// Records carry only a start date.
    pub pointtime: bool,

    /// Output value column.
    pub generate: String,
    /// Subjects-table columns copied to every output row.
    pub keepvars: Vec<String>,
    pub keepdates: bool,
    pub switching: bool,
    pub switchingdetail: bool,
    pub statetime: bool,
    /// Drop records of unknown subjects instead of failing.
    pub best_effort: bool,
    /// Attach per-subject coverage rows to the result.
    #[serde(alias = "check")]
    pub validate: bool,
}

impl Default for ExposeOptions {
    fn default() -> Self {
        Self {
            columns: ExposeColumns::default(),
            reference: 0,
            evertreated: false,
            currentformer: false,
            continuousunit: None,
            duration: None,
            recency: None,
            recency_unit: None,
            dose: false,
            dosecuts: None,
            expandunit: None,
            bytype: false,
            priority: None,
            split: false,
            layer: false,
            grace: Grace::default(),
            merge_days: 0,
            lag: 0,
            washout: 0,
            window: None,
            carryforward: 0,
            fillgaps: 0,
            pointtime: false,
            generate: "tv_exposure".to_string(),
            keepvars: Vec::new(),
            keepdates: false,
            switching: false,
            switchingdetail: false,
            statetime: false,
            best_effort: false,
            validate: false,
        }
    }
}

impl ExposeOptions {
    pub fn new(columns: ExposeColumns) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    pub fn with_reference(mut self, reference: i64) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_evertreated(mut self) -> Self {
        self.evertreated = true;
        self
    }

    pub fn with_currentformer(mut self) -> Self {
        self.currentformer = true;
        self
    }

    pub fn with_continuous(mut self, unit: TimeUnit) -> Self {
        self.continuousunit = Some(unit);
        self
    }

    pub fn with_duration(mut self, cuts: Vec<f64>) -> Self {
        self.duration = Some(cuts);
        self
    }

    pub fn with_recency(mut self, cuts: Vec<f64>) -> Self {
        self.recency = Some(cuts);
        self
    }

    pub fn with_recency_unit(mut self, unit: TimeUnit) -> Self {
        self.recency_unit = Some(unit);
        self
    }

    pub fn with_dose(mut self) -> Self {
        self.dose = true;
        self
    }

    pub fn with_dosecuts(mut self, cuts: Vec<f64>) -> Self {
        self.dosecuts = Some(cuts);
        self
    }

    pub fn with_expandunit(mut self, unit: TimeUnit) -> Self {
        self.expandunit = Some(unit);
        self
    }

    pub fn with_bytype(mut self) -> Self {
        self.bytype = true;
        self
    }

    pub fn with_priority(mut self, ranking: Vec<i64>) -> Self {
        self.priority = Some(ranking);
        self
    }

    pub fn with_split(mut self) -> Self {
        self.split = true;
        self
    }

    pub fn with_layer(mut self) -> Self {
        self.layer = true;
        self
    }

    pub fn with_grace(mut self, grace: Grace) -> Self {
        self.grace = grace;
        self
    }

    pub fn with_merge_days(mut self, days: i32) -> Self {
        self.merge_days = days;
        self
    }

    pub fn with_lag(mut self, days: i32) -> Self {
        self.lag = days;
        self
    }

    pub fn with_washout(mut self, days: i32) -> Self {
        self.washout = days;
        self
    }

    pub fn with_window(mut self, min: i32, max: i32) -> Self {
        self.window = Some((min, max));
        self
    }

    pub fn with_carryforward(mut self, days: i32) -> Self {
        self.carryforward = days;
        self
    }

    pub fn with_fillgaps(mut self, days: i32) -> Self {
        self.fillgaps = days;
        self
    }

    pub fn with_pointtime(mut self) -> Self {
        self.pointtime = true;
        self
    }

    pub fn with_generate(mut self, name: impl Into<String>) -> Self {
        self.generate = name.into();
        self
    }

    pub fn with_keepvars(mut self, names: Vec<String>) -> Self {
        self.keepvars = names;
        self
    }

    pub fn with_keepdates(mut self) -> Self {
        self.keepdates = true;
        self
    }

    pub fn with_switching(mut self, detail: bool) -> Self {
        self.switching = true;
        self.switchingdetail = detail;
        self
    }

    pub fn with_statetime(mut self) -> Self {
        self.statetime = true;
        self
    }

    pub fn with_best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    pub fn with_validation(mut self) -> Self {
        self.validate = true;
        self
    }

    /// Validate the option combination and build the execution plan.
    ///
    /// # Errors
    ///
    /// Returns [`TvError::Configuration`] for conflicting or invalid options.
    pub fn resolve(&self) -> Result<ExposurePlan> {
        let mut notes = Vec::new();

        for (name, days) in [
            ("merge_days", self.merge_days),
            ("lag", self.lag),
            ("washout", self.washout),
            ("carryforward", self.carryforward),
            ("fillgaps", self.fillgaps),
        ] {
            if days < 0 {
                return Err(TvError::config(format!("{name} must not be negative")));
            }
        }
        self.grace.validate()?;
        if let Some((min, max)) = self.window
            && (min < 1 || min > max)
        {
            return Err(TvError::config(format!(
                "window ({min}, {max}) must satisfy 1 <= min <= max"
            )));
        }
        if self.generate.trim().is_empty() {
            return Err(TvError::config("generate must name a column"));
        }

        let definition = self.resolve_definition()?;
        let overlap = self.resolve_overlap()?;

        let mut reference = self.reference;
        if self.dose && reference != 0 {
            notes.push(format!(
                "dose mode treats 0 as the reference; reference {reference} ignored"
            ));
            reference = 0;
        }

        if self.bytype
            && !matches!(
                definition,
                ExposureDefinition::EverTreated | ExposureDefinition::CurrentFormer
            )
        {
            return Err(TvError::config(
                "bytype requires evertreated or currentformer",
            ));
        }

        if let Some(unit) = self.expandunit
            && !definition.is_continuous()
        {
            return Err(TvError::config(format!(
                "expandunit {unit} requires continuous exposure or dose without dosecuts"
            )));
        }

        Ok(ExposurePlan {
            reference,
            definition,
            overlap,
            grace: self.grace.clone(),
            merge_days: self.merge_days,
            lag: self.lag,
            washout: self.washout,
            window: self.window,
            carryforward: self.carryforward,
            fillgaps: self.fillgaps,
            pointtime: self.pointtime,
            expand: self.expandunit,
            by_type: self.bytype,
            patterns: PatternFlags {
                switching: self.switching || self.switchingdetail,
                detail: self.switchingdetail,
                statetime: self.statetime,
            },
            notes,
        })
    }

    fn resolve_definition(&self) -> Result<ExposureDefinition> {
        let requested = [
            self.evertreated,
            self.currentformer,
            self.continuousunit.is_some() || self.duration.is_some(),
            self.recency.is_some(),
            self.dose,
        ];
        if requested.iter().filter(|flag| **flag).count() > 1 {
            return Err(TvError::config(
                "only one of evertreated, currentformer, continuousunit/duration, recency or dose may be given",
            ));
        }
        if self.dosecuts.is_some() && !self.dose {
            return Err(TvError::config("dosecuts requires dose"));
        }
        if self.recency_unit.is_some() && self.recency.is_none() {
            return Err(TvError::config("recency_unit requires recency"));
        }

        if self.evertreated {
            return Ok(ExposureDefinition::EverTreated);
        }
        if self.currentformer {
            return Ok(ExposureDefinition::CurrentFormer);
        }
        if let Some(cuts) = &self.duration {
            validate_cuts("duration", cuts)?;
            return Ok(ExposureDefinition::Duration {
                cuts: cuts.clone(),
                unit: self.continuousunit.unwrap_or(TimeUnit::Years),
            });
        }
        if let Some(unit) = self.continuousunit {
            return Ok(ExposureDefinition::Continuous { unit });
        }
        if let Some(cuts) = &self.recency {
            validate_cuts("recency", cuts)?;
            return Ok(ExposureDefinition::Recency {
                cuts: cuts.clone(),
                unit: self.recency_unit.unwrap_or(TimeUnit::Years),
            });
        }
        if self.dose {
            if let Some(cuts) = &self.dosecuts {
                validate_cuts("dosecuts", cuts)?;
            }
            return Ok(ExposureDefinition::Dose {
                cuts: self.dosecuts.clone(),
            });
        }
        Ok(ExposureDefinition::Categorical)
    }

    fn resolve_overlap(&self) -> Result<OverlapStrategy> {
        let requested = [self.priority.is_some(), self.split, self.layer];
        if requested.iter().filter(|flag| **flag).count() > 1 {
            return Err(TvError::config(
                "only one of priority, split or layer may be given",
            ));
        }
        if self.dose {
            if self.priority.is_some() || self.layer {
                return Err(TvError::config(
                    "dose amounts are allocated by split; priority and layer are not allowed",
                ));
            }
            return Ok(OverlapStrategy::Split);
        }
        if let Some(ranking) = &self.priority {
            if ranking.is_empty() {
                return Err(TvError::config("priority must list at least one value"));
            }
            let unique: BTreeSet<i64> = ranking.iter().copied().collect();
            if unique.len() != ranking.len() {
                return Err(TvError::config("priority lists a value more than once"));
            }
            return Ok(OverlapStrategy::Priority(ranking.clone()));
        }
        if self.split {
            return Ok(OverlapStrategy::Split);
        }
        Ok(OverlapStrategy::Layer)
    }
}

fn validate_cuts(name: &str, cuts: &[f64]) -> Result<()> {
    if cuts.is_empty() {
        return Err(TvError::config(format!("{name} needs at least one cutpoint")));
    }
    if cuts.iter().any(|cut| !cut.is_finite() || *cut <= 0.0) {
        return Err(TvError::config(format!(
            "{name} cutpoints must be positive numbers"
        )));
    }
    if cuts.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(TvError::config(format!(
            "{name} cutpoints must be strictly ascending"
        )));
    }
    Ok(())
}

/// The exposure definition applied by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureDefinition {
    /// Resolved exposure codes, unchanged.
    Categorical,
    EverTreated,
    CurrentFormer,
    /// Cumulative exposed time in `unit`.
    Continuous { unit: TimeUnit },
    /// Cumulative exposed time bucketed by `cuts` (in `unit`).
    Duration { cuts: Vec<f64>, unit: TimeUnit },
    /// Time since last exposure bucketed by `cuts` (in `unit`).
    Recency { cuts: Vec<f64>, unit: TimeUnit },
    /// Cumulative dose, bucketed when `cuts` is given.
    Dose { cuts: Option<Vec<f64>> },
}

impl ExposureDefinition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Categorical => "time-varying",
            Self::EverTreated => "evertreated",
            Self::CurrentFormer => "currentformer",
            Self::Continuous { .. } => "continuous",
            Self::Duration { .. } => "duration",
            Self::Recency { .. } => "recency",
            Self::Dose { cuts: None } => "dose",
            Self::Dose { cuts: Some(_) } => "dose categories",
        }
    }

    /// True when output values are a running measure rather than categories.
    pub fn is_continuous(&self) -> bool {
        matches!(self, Self::Continuous { .. } | Self::Dose { cuts: None })
    }

    /// True for piecewise-constant outputs that are collapsed after classification.
    pub fn is_collapsible(&self) -> bool {
        !self.is_continuous()
    }

    pub fn is_dose(&self) -> bool {
        matches!(self, Self::Dose { .. })
    }
}

/// How overlapping intervals of different values are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapStrategy {
    /// Ranking, highest priority first. Unranked values rank last.
    Priority(Vec<i64>),
    Split,
    Layer,
}

impl OverlapStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Priority(_) => "priority",
            Self::Split => "split",
            Self::Layer => "layer",
        }
    }
}

/// Pattern columns added to the final partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternFlags {
    pub switching: bool,
    pub detail: bool,
    pub statetime: bool,
}

impl PatternFlags {
    pub fn any(&self) -> bool {
        self.switching || self.detail || self.statetime
    }
}

/// Validated exposure-construction plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposurePlan {
    pub reference: i64,
    pub definition: ExposureDefinition,
    pub overlap: OverlapStrategy,
    pub grace: Grace,
    pub merge_days: i32,
    pub lag: i32,
    pub washout: i32,
    pub window: Option<(i32, i32)>,
    pub carryforward: i32,
    pub fillgaps: i32,
    pub pointtime: bool,
    pub expand: Option<TimeUnit>,
    /// Classify each exposure code separately as well.
    pub by_type: bool,
    pub patterns: PatternFlags,
    /// Non-fatal adjustments made while resolving.
    pub notes: Vec<String>,
}

impl ExposurePlan {
    pub fn is_dose(&self) -> bool {
        self.definition.is_dose()
    }
}

// =============================================================================
// Multi-dataset merge
// =============================================================================

/// Column names of one dataset taking part in a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSource {
    pub start: String,
    pub stop: String,
    pub value: String,
    /// Scale the value proportionally when its interval is narrowed.
    #[serde(default)]
    pub continuous: bool,
}

impl MergeSource {
    pub fn new(start: impl Into<String>, stop: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            stop: stop.into(),
            value: value.into(),
            continuous: false,
        }
    }

    pub fn continuous(mut self) -> Self {
        self.continuous = true;
        self
    }
}

/// Options for intersecting several time-varying datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Subject id column, shared by every dataset.
    pub id: String,
    /// One entry per dataset, in dataset order.
    pub sources: Vec<MergeSource>,
    /// Output value names, one per dataset.
    pub generate: Option<Vec<String>>,
    /// Prefix added to each source value name.
    pub prefix: Option<String>,
    pub startname: String,
    pub stopname: String,
    /// Extra columns carried through as `<name>_ds<k>`.
    pub keep: Vec<String>,
    /// Merge common subjects only instead of failing on a mismatch.
    pub force: bool,
    /// Share of subjects processed per batch, 1 to 100.
    pub batch_percent: u8,
    pub validatecoverage: bool,
    pub validateoverlap: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            sources: Vec::new(),
            generate: None,
            prefix: None,
            startname: "start".to_string(),
            stopname: "stop".to_string(),
            keep: Vec::new(),
            force: false,
            batch_percent: 20,
            validatecoverage: false,
            validateoverlap: false,
        }
    }
}

impl MergeOptions {
    pub fn new(id: impl Into<String>, sources: Vec<MergeSource>) -> Self {
        Self {
            id: id.into(),
            sources,
            ..Default::default()
        }
    }

    pub fn with_generate(mut self, names: Vec<String>) -> Self {
        self.generate = Some(names);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_names(mut self, start: impl Into<String>, stop: impl Into<String>) -> Self {
        self.startname = start.into();
        self.stopname = stop.into();
        self
    }

    pub fn with_keep(mut self, names: Vec<String>) -> Self {
        self.keep = names;
        self
    }

    pub fn with_force(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn with_batch_percent(mut self, percent: u8) -> Self {
        self.batch_percent = percent;
        self
    }

    pub fn with_validation(mut self, coverage: bool, overlap: bool) -> Self {
        self.validatecoverage = coverage;
        self.validateoverlap = overlap;
        self
    }

    /// Validate against the number of datasets and return the output value names.
    ///
    /// # Errors
    ///
    /// Returns [`TvError::Configuration`] when the options do not fit the datasets.
    pub fn resolve(&self, n_datasets: usize) -> Result<Vec<String>> {
        if n_datasets < 2 {
            return Err(TvError::config(format!(
                "merging needs at least two datasets, got {n_datasets}"
            )));
        }
        if self.sources.len() != n_datasets {
            return Err(TvError::config(format!(
                "{} column mappings given for {n_datasets} datasets",
                self.sources.len()
            )));
        }
        if self.generate.is_some() && self.prefix.is_some() {
            return Err(TvError::config("generate and prefix are mutually exclusive"));
        }
        if !(1..=100).contains(&self.batch_percent) {
            return Err(TvError::config(format!(
                "batch_percent must lie in 1..=100, got {}",
                self.batch_percent
            )));
        }
        if self.startname == self.stopname {
            return Err(TvError::config("startname and stopname must differ"));
        }

        let names: Vec<String> = match (&self.generate, &self.prefix) {
            (Some(names), _) => {
                if names.len() != n_datasets {
                    return Err(TvError::config(format!(
                        "{} generate names given for {n_datasets} datasets",
                        names.len()
                    )));
                }
                names.clone()
            }
            (None, Some(prefix)) => self
                .sources
                .iter()
                .map(|source| format!("{prefix}{}", source.value))
                .collect(),
            (None, None) => self.sources.iter().map(|s| s.value.clone()).collect(),
        };

        let mut seen = BTreeSet::new();
        for name in &names {
            if name == &self.id || name == &self.startname || name == &self.stopname {
                return Err(TvError::config(format!(
                    "value column '{name}' collides with the id or interval columns"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(TvError::config(format!(
                    "value column '{name}' is produced by more than one dataset"
                )));
            }
        }
        Ok(names)
    }
}

// =============================================================================
// Event integration
// =============================================================================

/// Column names of the events table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventColumns {
    pub id: String,
    /// Primary outcome date.
    pub date: String,
    /// Competing-risk dates, coded 2, 3, ... in this order.
    pub compete: Vec<String>,
}

impl Default for EventColumns {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            date: "date".to_string(),
            compete: Vec::new(),
        }
    }
}

impl EventColumns {
    pub fn new(id: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            date: date.into(),
            compete: Vec::new(),
        }
    }

    pub fn with_compete(mut self, columns: Vec<String>) -> Self {
        self.compete = columns;
        self
    }
}

/// Whether the first event ends follow-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventMode {
    /// Terminal outcome: follow-up is censored at the first event.
    #[default]
    Single,
    Recurring,
}

impl EventMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Recurring => "recurring",
        }
    }
}

/// Options for integrating outcome events into an interval table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventOptions {
    pub columns: EventColumns,
    pub startvar: String,
    pub stopvar: String,
    /// Event flag column.
    pub generate: String,
    /// Overwrite `generate` if it already exists.
    pub replace: bool,
    pub mode: EventMode,
    /// Interval columns rescaled proportionally when an interval is split.
    pub continuous: Vec<String>,
    /// Events-table columns copied onto flagged rows.
    pub keepvars: Vec<String>,
    /// Duration column name.
    pub timegen: Option<String>,
    pub timeunit: TimeUnit,
    /// Labels by event code.
    pub eventlabels: BTreeMap<i64, String>,
}

impl Default for EventOptions {
    fn default() -> Self {
        Self {
            columns: EventColumns::default(),
            startvar: "start".to_string(),
            stopvar: "stop".to_string(),
            generate: "_failure".to_string(),
            replace: false,
            mode: EventMode::default(),
            continuous: Vec::new(),
            keepvars: Vec::new(),
            timegen: None,
            timeunit: TimeUnit::Days,
            eventlabels: BTreeMap::new(),
        }
    }
}

impl EventOptions {
    pub fn new(columns: EventColumns) -> Self {
        Self {
            columns,
            ..Default::default()
        }
    }

    pub fn with_interval_columns(mut self, start: impl Into<String>, stop: impl Into<String>) -> Self {
        self.startvar = start.into();
        self.stopvar = stop.into();
        self
    }

    pub fn with_generate(mut self, name: impl Into<String>) -> Self {
        self.generate = name.into();
        self
    }

    pub fn with_replace(mut self) -> Self {
        self.replace = true;
        self
    }

    pub fn with_mode(mut self, mode: EventMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_continuous(mut self, columns: Vec<String>) -> Self {
        self.continuous = columns;
        self
    }

    pub fn with_keepvars(mut self, columns: Vec<String>) -> Self {
        self.keepvars = columns;
        self
    }

    pub fn with_timegen(mut self, name: impl Into<String>, unit: TimeUnit) -> Self {
        self.timegen = Some(name.into());
        self.timeunit = unit;
        self
    }

    pub fn with_label(mut self, code: i64, label: impl Into<String>) -> Self {
        self.eventlabels.insert(code, label.into());
        self
    }

    /// Check option consistency independent of the input tables.
    ///
    /// # Errors
    ///
    /// Returns [`TvError::Configuration`] for invalid names or labels.
    pub fn validate(&self) -> Result<()> {
        if self.generate.trim().is_empty() {
            return Err(TvError::config("generate must name a column"));
        }
        if self.startvar == self.stopvar {
            return Err(TvError::config("startvar and stopvar must differ"));
        }
        if let Some(timegen) = &self.timegen
            && (timegen == &self.generate || timegen == &self.startvar || timegen == &self.stopvar)
        {
            return Err(TvError::config(format!(
                "timegen '{timegen}' collides with another output column"
            )));
        }
        let max_code = self.columns.compete.len() as i64 + 1;
        if let Some(code) = self
            .eventlabels
            .keys()
            .find(|code| **code < 0 || **code > max_code)
        {
            return Err(TvError::config(format!(
                "event label given for unknown event code {code}"
            )));
        }
        Ok(())
    }

    /// Label for every event code, including 0 for censored rows.
    pub fn labels(&self) -> BTreeMap<i64, String> {
        let mut labels = BTreeMap::new();
        labels.insert(0, "Censored".to_string());
        labels.insert(1, "Primary event".to_string());
        for k in 0..self.columns.compete.len() {
            labels.insert(k as i64 + 2, format!("Competing risk {}", k + 1));
        }
        for (code, label) in &self.eventlabels {
            labels.insert(*code, label.clone());
        }
        labels
    }
}
