//! Error types.
//!
//! Two layers:
//!
//! - [`FitError`]: per-group failures raised by the core (aggregation, fit,
//!   diagnostics). These never abort a run; they are recorded in the group's
//!   outcome slot.
//! - [`AppError`]: whole-run failures with a process exit code (bad input file,
//!   no groups at all, export failure).

use serde::{Deserialize, Serialize};

/// Failure of a single angle group.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    /// A value outside the power-law domain (must be finite and > 0).
    #[error("invalid observation: {0}")]
    InvalidObservation(String),
    /// Nothing to aggregate.
    #[error("group has no observations")]
    EmptyGroup,
    /// Fewer distinct points than the fit needs.
    #[error("insufficient data: {have} distinct point(s), need at least {need}")]
    InsufficientData { have: usize, need: usize },
    /// Optimizer failure or unusable covariance.
    #[error("fit did not converge: {0}")]
    FitDidNotConverge(String),
    /// Zero variance in the aggregated values, so R² is undefined.
    #[error("degenerate fit: all aggregated values are identical, R² is undefined")]
    DegenerateFit,
}

/// Serializable discriminant of [`FitError`], used in reports and exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidObservation,
    EmptyGroup,
    InsufficientData,
    FitDidNotConverge,
    DegenerateFit,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::InvalidObservation => "InvalidObservation",
            ErrorKind::EmptyGroup => "EmptyGroup",
            ErrorKind::InsufficientData => "InsufficientData",
            ErrorKind::FitDidNotConverge => "FitDidNotConverge",
            ErrorKind::DegenerateFit => "DegenerateFit",
        }
    }
}

impl FitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FitError::InvalidObservation(_) => ErrorKind::InvalidObservation,
            FitError::EmptyGroup => ErrorKind::EmptyGroup,
            FitError::InsufficientData { .. } => ErrorKind::InsufficientData,
            FitError::FitDidNotConverge(_) => ErrorKind::FitDidNotConverge,
            FitError::DegenerateFit => ErrorKind::DegenerateFit,
        }
    }
}

/// Whole-run failure carrying the process exit code.
///
/// Exit codes: `2` bad input/config/IO, `3` no usable data, `4` internal or
/// export failure.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = FitError::InsufficientData { have: 1, need: 3 };
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
        assert!(err.to_string().contains("1 distinct point"));
        assert_eq!(FitError::DegenerateFit.kind().label(), "DegenerateFit");
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::FitDidNotConverge).unwrap();
        assert_eq!(json, "\"fit_did_not_converge\"");
    }
}
