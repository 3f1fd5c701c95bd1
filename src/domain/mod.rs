//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input configuration enums (`AngleEncoding`, `Cohort`, `GuessMode`)
//! - raw judgments and their grouping (`Observation`, `ObservationGroup`)
//! - fit outputs (`AggregatedPoint`, `FittedModel`, `FitDiagnostics`, `GroupOutcome`)
//! - the cross-angle reduction (`CorpusSummary`)

pub mod types;

pub use types::*;
