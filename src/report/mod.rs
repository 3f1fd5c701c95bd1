//! Reporting utilities: per-point residual rows and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{Angle, GroupOutcome};

/// One aggregated point with its fitted value, for tables and exports.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRow {
    pub angle: Angle,
    pub physical: f64,
    pub representative: f64,
    pub count: usize,
    pub predicted: f64,
    pub residual: f64,
    pub log_residual: f64,
}

/// Rows for a fitted angle; empty for a failed one.
pub fn point_rows(outcome: &GroupOutcome) -> Vec<PointRow> {
    let Some(fit) = outcome.fit() else {
        return Vec::new();
    };
    fit.points
        .iter()
        .zip(&fit.diagnostics.log_residuals)
        .map(|(p, &log_residual)| {
            let predicted = fit.model.predict(p.physical);
            PointRow {
                angle: outcome.angle,
                physical: p.physical,
                representative: p.representative,
                count: p.count,
                predicted,
                residual: p.representative - predicted,
                log_residual,
            }
        })
        .collect()
}
