//! Core types for converting interactive-fiction stories between authoring
//! dialects.
//!
//! The crate is dialect-agnostic: concrete dialects implement [`Syntax`]
//! (in the `reweave-dialect-*` crates) and the per-pair compatibility
//! tables live in `reweave-convert`. Everything those crates share is here:
//! the story model, the construct/occurrence contract, expression tokens,
//! the compatibility matrix, the conversion report and the segment-based
//! rewrite pipeline.

pub mod construct;
pub mod dialect;
pub mod error;
pub mod expr;
pub mod matrix;
pub mod pipeline;
pub mod report;
pub mod scan;
pub mod story;
pub mod syntax;

pub use construct::{
    AltMode, Assign, Branch, Construct, ConstructKind, HookOp, Occurrence, VarsEntry, WidgetKind,
};
pub use dialect::Dialect;
pub use error::CoreError;
pub use matrix::{
    Classification, CompatibilityMatrix, FeatureRule, MatchPattern, MatrixRegistry, Severity,
};
pub use pipeline::{ConvertOptions, LossPolicy, Preset, RewritePipeline};
pub use report::{ConversionReport, ConversionReportEntry, EntryDetail, EntryType, ReportSink};
pub use story::{Passage, Story};
pub use syntax::{Emission, FeatureSpec, Layout, LexContext, Syntax};
