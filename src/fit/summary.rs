//! Cross-angle reduction.
//!
//! Runs strictly after every group has been processed, as a fold over the
//! outcomes sorted by angle. Sorting first makes the floating-point summation
//! order independent of the order in which groups were fitted.

use crate::domain::{CorpusSummary, Distribution, FailedGroup, GroupOutcome, ResidualSummary};
use crate::math::{mean, population_std_dev, rms};

impl Distribution {
    /// Mean and population standard deviation, or `None` for no values.
    pub fn of(values: &[f64]) -> Option<Self> {
        Some(Self {
            n: values.len(),
            mean: mean(values)?,
            std_dev: population_std_dev(values)?,
        })
    }
}

impl CorpusSummary {
    pub fn from_outcomes(outcomes: &[GroupOutcome]) -> Self {
        let mut sorted: Vec<&GroupOutcome> = outcomes.iter().collect();
        sorted.sort_by_key(|o| o.angle);

        let fits: Vec<_> = sorted.iter().filter_map(|o| o.fit()).collect();
        let failures: Vec<FailedGroup> = sorted
            .iter()
            .filter_map(|o| {
                o.failure().map(|f| FailedGroup {
                    angle: o.angle,
                    kind: f.kind,
                    message: f.message.clone(),
                })
            })
            .collect();

        let r_squared: Vec<f64> = fits.iter().map(|f| f.diagnostics.r_squared).collect();
        let exponent: Vec<f64> = fits.iter().map(|f| f.model.a).collect();
        let scale: Vec<f64> = fits.iter().map(|f| f.model.k).collect();
        let effective: Vec<f64> = fits.iter().map(|f| f.model.effective_scale()).collect();
        let pooled: Vec<f64> = fits
            .iter()
            .flat_map(|f| f.diagnostics.log_residuals.iter().copied())
            .collect();

        let log_residuals = match (mean(&pooled), rms(&pooled)) {
            (Some(mean), Some(rms)) => Some(ResidualSummary {
                n: pooled.len(),
                mean,
                rms,
            }),
            _ => None,
        };

        CorpusSummary {
            groups_total: sorted.len(),
            groups_fitted: fits.len(),
            failures,
            r_squared: Distribution::of(&r_squared),
            exponent: Distribution::of(&exponent),
            scale: Distribution::of(&scale),
            effective_scale: Distribution::of(&effective),
            log_residuals,
        }
    }
}
