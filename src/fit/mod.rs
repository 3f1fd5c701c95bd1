//! The per-angle core: aggregation, power-law fit, diagnostics, and the
//! cross-angle summary.
//!
//! Every function here is pure: no I/O, no clocks, no shared state.

pub mod aggregate;
pub mod diagnostics;
pub mod fitter;
pub mod summary;

pub use aggregate::*;
pub use diagnostics::*;
pub use fitter::*;
