//! Interval-transformation engine for time-varying exposure analysis.
//!
//! This crate turns period-indexed exposure records into per-subject
//! partitions of the observation window and provides three table-level
//! entry points:
//!
//! - **tv_expose**: build a time-varying exposure table from subject windows
//!   and exposure records
//! - **tv_merge**: intersect several time-varying tables that share subjects
//! - **tv_event**: flag and split intervals at outcome events, resolving
//!   competing risks
//!
//! The per-subject stages in [`stages`] and [`classify`] are pure functions
//! over `tv_model::Interval` lists and can be used without polars.

mod batch;
pub mod classify;
pub mod context;
pub mod coverage;
pub mod events;
mod frame;
pub mod intersect;
pub mod pipeline;
pub mod stages;
pub mod tvevent;
pub mod tvexpose;
pub mod tvmerge;

pub use context::{Diagnostic, DiagnosticLevel, Diagnostics};
pub use coverage::CoverageRow;
pub use pipeline::{SubjectPartition, build_partition, build_partition_with_types};
pub use tvevent::{EventResult, EventSummary, tv_event};
pub use tvexpose::{ExposeResult, ExposeSummary, tv_expose};
pub use tvmerge::{MergeResult, MergeSummary, tv_merge};
