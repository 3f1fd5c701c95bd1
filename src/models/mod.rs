//! The scaled power-law model family.
//!
//! Implemented as small, pure functions so that fitting and reporting code can
//! share one definition of the curve.

pub mod power_law;

pub use power_law::*;
