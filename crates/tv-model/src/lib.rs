//! Data model for time-varying exposure construction.
//!
//! Everything the engine passes between stages lives here: subject ids,
//! interval values, intervals and partitions, decoded input records, the
//! option structs callers fill in and the plans they resolve to, and the
//! error taxonomy.

pub mod error;
pub mod ids;
pub mod interval;
pub mod options;
pub mod records;
pub mod value;

pub use error::{ErrorKind, Result, TvError};
pub use ids::SubjectId;
pub use interval::{CoverageIssue, Day, Interval, Partition};
pub use options::{
    EventColumns, EventMode, EventOptions, ExposeColumns, ExposeOptions, ExposureDefinition,
    ExposurePlan, Grace, MergeOptions, MergeSource, OverlapStrategy, PatternFlags, TimeUnit,
};
pub use records::{EventRecord, ExposureRecord, Subject};
pub use value::ExposureValue;
