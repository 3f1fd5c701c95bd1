//! Per-group goodness of fit.
//!
//! - linear-scale R² (the fit minimizes linear-scale error, so this is the
//!   matching quality measure)
//! - log-scale residuals `ln y - ln f(x)`, pooled across angles for the
//!   multiplicative error distribution
//!
//! Both are computed from the same `FittedModel`.

use crate::domain::{AggregatedPoint, CurveSample, FitDiagnostics, FittedModel};
use crate::error::FitError;
use crate::math::rms;

/// Relative tolerance for treating the total sum of squares as zero.
const SS_TOT_REL_EPS: f64 = 1e-24;

/// `1 - SS_res / SS_tot`.
///
/// Fails with `DegenerateFit` when all observed values are identical; R² is
/// undefined there and is never coerced to 0 or 1.
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> Result<f64, FitError> {
    if observed.is_empty() || observed.len() != predicted.len() {
        return Err(FitError::InsufficientData {
            have: observed.len().min(predicted.len()),
            need: 1,
        });
    }
    let n = observed.len() as f64;
    let mean = observed.iter().sum::<f64>() / n;
    let ss_tot: f64 = observed.iter().map(|y| (y - mean) * (y - mean)).sum();
    let ss_res: f64 = observed
        .iter()
        .zip(predicted)
        .map(|(y, f)| (y - f) * (y - f))
        .sum();

    if ss_tot <= SS_TOT_REL_EPS * mean * mean * n {
        return Err(FitError::DegenerateFit);
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// `ln(representative) - ln(predicted)` per point.
pub fn log_residuals(points: &[AggregatedPoint], model: &FittedModel) -> Result<Vec<f64>, FitError> {
    points
        .iter()
        .map(|p| {
            let predicted = model.predict(p.physical);
            if !(p.representative > 0.0 && predicted > 0.0 && predicted.is_finite()) {
                return Err(FitError::InvalidObservation(format!(
                    "log residual undefined at physical distance {} (observed {}, predicted {predicted})",
                    p.physical, p.representative
                )));
            }
            Ok(p.representative.ln() - predicted.ln())
        })
        .collect()
}

/// Compute all diagnostics for one fitted group.
pub fn diagnose(points: &[AggregatedPoint], model: &FittedModel) -> Result<FitDiagnostics, FitError> {
    let observed: Vec<f64> = points.iter().map(|p| p.representative).collect();
    let predicted: Vec<f64> = points.iter().map(|p| model.predict(p.physical)).collect();

    let r_squared = r_squared(&observed, &predicted)?;
    let linear: Vec<f64> = observed.iter().zip(&predicted).map(|(y, f)| y - f).collect();
    let log_residuals = log_residuals(points, model)?;

    Ok(FitDiagnostics {
        r_squared,
        rmse: rms(&linear).unwrap_or(0.0),
        log_rms: rms(&log_residuals).unwrap_or(0.0),
        log_residuals,
    })
}

/// Sample the fitted curve at `n` evenly spaced points over `[x_min, x_max]`.
///
/// For display only; not part of the statistical result.
pub fn sample_curve(model: &FittedModel, x_min: f64, x_max: f64, n: usize) -> CurveSample {
    let n = n.max(2);
    let (x0, x1) = if x_max > x_min { (x_min, x_max) } else { (x_min, x_min) };

    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let xi = x0 + u * (x1 - x0);
        x.push(xi);
        y.push(model.predict(xi));
    }
    CurveSample { x, y }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::{FitOptions, fit_power_law};

    fn model(k: f64, a: f64) -> FittedModel {
        FittedModel {
            k,
            a,
            r: 1.0,
            covariance: [[0.0; 3]; 3],
            iterations: 0,
        }
    }

    fn points(xs: &[f64], ys: &[f64]) -> Vec<AggregatedPoint> {
        xs.iter()
            .zip(ys)
            .map(|(&physical, &representative)| AggregatedPoint {
                physical,
                representative,
                count: 1,
            })
            .collect()
    }

    #[test]
    fn r_squared_of_exact_predictions_is_one() {
        let y = [1.0, 3.0, 2.0, 5.0];
        assert_eq!(r_squared(&y, &y).unwrap(), 1.0);
    }

    #[test]
    fn r_squared_of_mean_prediction_is_zero() {
        let y = [1.0, 2.0, 3.0];
        let r2 = r_squared(&y, &[2.0, 2.0, 2.0]).unwrap();
        assert!(r2.abs() < 1e-12);
    }

    #[test]
    fn r_squared_can_be_negative() {
        let r2 = r_squared(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!((r2 - (-3.0)).abs() < 1e-12);
    }

    #[test]
    fn constant_observations_are_degenerate() {
        assert_eq!(
            r_squared(&[2.0, 2.0, 2.0], &[2.0, 2.0, 2.0]),
            Err(FitError::DegenerateFit)
        );
    }

    #[test]
    fn refit_of_own_predictions_is_exact() {
        let xs = [1.0, 2.0, 3.0, 5.0, 7.0];
        let noisy = [1.1, 1.7, 2.6, 3.1, 4.4];
        let first = fit_power_law(&points(&xs, &noisy), &FitOptions::default()).unwrap();

        let predicted: Vec<f64> = xs.iter().map(|&x| first.predict(x)).collect();
        let pts = points(&xs, &predicted);
        let second = fit_power_law(&pts, &FitOptions::default()).unwrap();
        let diag = diagnose(&pts, &second).unwrap();

        assert!((diag.r_squared - 1.0).abs() < 1e-9, "r2 = {}", diag.r_squared);
        assert!(diag.log_residuals.iter().all(|r| r.abs() < 1e-6));
        assert!(diag.rmse < 1e-6);
    }

    #[test]
    fn identity_scenario_diagnostics() {
        let pts = points(&[1.0, 2.0, 4.0, 8.0], &[1.0, 2.0, 4.0, 8.0]);
        let fitted = fit_power_law(&pts, &FitOptions::default()).unwrap();
        let diag = diagnose(&pts, &fitted).unwrap();
        assert!((diag.r_squared - 1.0).abs() < 1e-6);
        assert!((fitted.a - 1.0).abs() < 1e-3);
    }

    #[test]
    fn log_residuals_need_not_sum_to_zero() {
        // A linear-scale fit does not center the log residuals.
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let ys = [0.6, 2.5, 2.4, 5.1, 3.9, 7.5];
        let pts = points(&xs, &ys);
        let fitted = fit_power_law(&pts, &FitOptions::default()).unwrap();
        let residuals = log_residuals(&pts, &fitted).unwrap();
        let sum: f64 = residuals.iter().sum();
        assert!(sum.abs() > 1e-6, "log residual sum unexpectedly ~0: {sum}");
    }

    #[test]
    fn log_residuals_use_the_given_model() {
        let pts = points(&[1.0, 2.0], &[2.0, 2.0]);
        let residuals = log_residuals(&pts, &model(1.0, 1.0)).unwrap();
        assert!((residuals[0] - 2f64.ln()).abs() < 1e-12);
        assert!(residuals[1].abs() < 1e-12);
    }

    #[test]
    fn curve_spans_observed_range() {
        let curve = sample_curve(&model(2.0, 1.0), 1.0, 3.0, 5);
        assert_eq!(curve.x, vec![1.0, 1.5, 2.0, 2.5, 3.0]);
        assert_eq!(curve.y, vec![2.0, 3.0, 4.0, 5.0, 6.0]);
    }
}
