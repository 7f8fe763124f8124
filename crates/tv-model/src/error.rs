//! Error taxonomy shared by every stage of the engine.

use thiserror::Error;

/// Errors that abort a whole `tv_expose`, `tv_merge` or `tv_event` call.
///
/// Non-fatal conditions are never reported through this type; they are
/// attached to the result as warnings instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TvError {
    /// A required column is absent from one of the input tables.
    #[error("column '{column}' not found in {table}")]
    MissingColumn {
        /// Which input table was inspected.
        table: String,
        /// The configured column name.
        column: String,
    },

    /// Exposure records reference subjects that have no observation window.
    #[error("{count} exposure record(s) reference subjects missing from the subjects table")]
    UnmatchedSubjects {
        /// Number of offending records.
        count: usize,
    },

    /// Subjects whose observation window is missing or ends before it starts.
    #[error("{count} subject(s) have a missing or inverted observation window")]
    InvalidWindow {
        /// Number of offending subjects.
        count: usize,
    },

    /// Conflicting or invalid option combination.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Subject sets differ across merge inputs and `force` was not set.
    #[error(
        "subject mismatch between datasets: {missing} subject(s) absent from at least one dataset; set force to merge common subjects only"
    )]
    IdMismatch {
        /// Subjects present in some but not all datasets.
        missing: usize,
    },

    /// A fixed-point loop failed to stabilize.
    #[error("{stage} did not converge after {iterations} iterations")]
    Convergence {
        /// Stage that owns the loop.
        stage: &'static str,
        /// Iteration cap that was reached.
        iterations: usize,
    },

    /// Failure reported by the dataframe layer.
    #[error("table error: {0}")]
    Table(String),
}

/// Category of a [`TvError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Schema,
    Configuration,
    IdMismatch,
    Convergence,
    Table,
}

impl TvError {
    /// Build a configuration error from any message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Build a missing-column error.
    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingColumn { .. }
            | Self::UnmatchedSubjects { .. }
            | Self::InvalidWindow { .. } => ErrorKind::Schema,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::IdMismatch { .. } => ErrorKind::IdMismatch,
            Self::Convergence { .. } => ErrorKind::Convergence,
            Self::Table(_) => ErrorKind::Table,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, TvError>;
