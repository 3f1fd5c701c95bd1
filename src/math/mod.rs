//! Mathematical utilities: moments and linear least squares.

pub mod moments;
pub mod ols;

pub use moments::*;
pub use ols::*;
