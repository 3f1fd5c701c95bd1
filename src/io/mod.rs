//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - per-point and raw-observation CSV exports (`export`)
//! - results JSON read/write (`results`)

pub mod export;
pub mod ingest;
pub mod results;

pub use export::*;
pub use ingest::*;
pub use results::*;
