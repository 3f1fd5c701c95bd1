//! Nonlinear least-squares fit of `y = k · x^a · r`.
//!
//! Given the aggregated points `(x_i, y_i)` of one angle we minimize
//!
//! ```text
//! Σ (y_i - k · x_i^a · r)^2
//! ```
//!
//! in **linear** scale with Levenberg–Marquardt.
//!
//! `k` and `r` enter only as a product, so the pair is not identifiable. The
//! fit holds `r` at a caller-supplied calibration value (default `1.0`) and
//! estimates `(k, a)`; only `k · r` is meaningful downstream.
//!
//! The search runs over `(ln k, a)`. In that space `ln f = ln k + a ln x + ln r`
//! is linear, so the long curved valley that steep data traces in `(k, a)`
//! (k collapsing by orders of magnitude as `a` grows) becomes a straight one,
//! and `k` cannot leave the positive half-line. Damping follows Nielsen's gain
//! ratio update rather than fixed ×10 / ÷10 steps.
//!
//! Starting point matters for nonlinear least squares. The default derives it
//! from a straight-line fit of `ln y` on `ln x`, which is exact for noise-free
//! power laws and close for multiplicative noise.

use nalgebra::{Matrix2, Vector2};
use tracing::debug;

use crate::domain::{AggregatedPoint, FittedModel, GuessMode};
use crate::error::{AppError, FitError};
use crate::math::fit_line;
use crate::models::{gradient, gradient_ln_k, predict_ln_k};

/// Minimum number of distinct physical distances for a fit.
///
/// The model is written with three parameters; one distinct point per
/// parameter is required even though `r` is held fixed.
pub const MIN_DISTINCT_POINTS: usize = 3;

/// Number of parameters actually estimated (`k`, `a`).
const ESTIMATED_PARAMS: usize = 2;

/// Initial damping, relative to `diag(JᵀJ)`.
const LAMBDA_INIT: f64 = 1e-3;
/// Damping above which the search is abandoned.
const LAMBDA_MAX: f64 = 1e16;
const LAMBDA_MIN: f64 = 1e-300;
/// Relative SSE reduction below which an accepted step counts as converged.
const FTOL: f64 = 1e-12;
/// Relative step size below which the search counts as converged.
const XTOL: f64 = 1e-10;
/// Largest cosine between a Jacobian column and the residual vector at an optimum.
const GTOL: f64 = 1e-10;
/// SSE below this fraction of `Σ y²` is an exact fit.
const SSE_REL_FLOOR: f64 = 1e-24;
/// Floor on the Marquardt diagonal scaling.
const DIAG_FLOOR: f64 = 1e-300;

/// Where the search starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitialGuess {
    /// OLS of `ln y` on `ln x`; falls back to [`InitialGuess::Unit`] if that fails.
    LogLinear,
    /// `k = 1`, `a = 1`.
    Unit,
    /// Caller-supplied start; `k` must be positive.
    Explicit { k: f64, a: f64 },
}

impl From<GuessMode> for InitialGuess {
    fn from(mode: GuessMode) -> Self {
        match mode {
            GuessMode::LogLinear => InitialGuess::LogLinear,
            GuessMode::Unit => InitialGuess::Unit,
        }
    }
}

/// Fitting options.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub initial_guess: InitialGuess,
    /// Calibration constant `r` (finite, `> 0`), held fixed.
    pub r_fixed: f64,
    /// Iteration budget; exhausting it is a fit failure, not a truncated result.
    pub max_iterations: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            initial_guess: InitialGuess::LogLinear,
            r_fixed: 1.0,
            max_iterations: 800,
        }
    }
}

impl FitOptions {
    /// Reject settings that no data could make valid.
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.r_fixed.is_finite() && self.r_fixed > 0.0) {
            return Err(AppError::new(
                2,
                format!("Calibration constant r must be finite and > 0, got {}.", self.r_fixed),
            ));
        }
        if self.max_iterations == 0 {
            return Err(AppError::new(2, "Iteration budget must be >= 1."));
        }
        if let InitialGuess::Explicit { k, a } = self.initial_guess {
            if !(k.is_finite() && k > 0.0 && a.is_finite()) {
                return Err(AppError::new(
                    2,
                    format!("Initial guess needs finite k > 0 and finite a, got k={k}, a={a}."),
                ));
            }
        }
        Ok(())
    }
}

/// Fit the power law to aggregated points.
pub fn fit_power_law(points: &[AggregatedPoint], opts: &FitOptions) -> Result<FittedModel, FitError> {
    let r = opts.r_fixed;
    if !(r.is_finite() && r > 0.0) {
        return Err(FitError::InvalidObservation(format!(
            "calibration constant r must be finite and > 0, got {r}"
        )));
    }

    for p in points {
        if !(p.physical.is_finite() && p.physical > 0.0) {
            return Err(FitError::InvalidObservation(format!(
                "physical distance must be positive, got {}",
                p.physical
            )));
        }
        if !p.representative.is_finite() {
            return Err(FitError::InvalidObservation(format!(
                "non-finite value at physical distance {}",
                p.physical
            )));
        }
    }

    let distinct = count_distinct(points);
    if distinct < MIN_DISTINCT_POINTS {
        return Err(FitError::InsufficientData {
            have: distinct,
            need: MIN_DISTINCT_POINTS,
        });
    }

    let xs: Vec<f64> = points.iter().map(|p| p.physical).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.representative).collect();

    let (k0, a0) = initial_params(opts.initial_guess, &xs, &ys, r);
    if !(k0.is_finite() && k0 > 0.0 && a0.is_finite()) {
        return Err(FitError::FitDidNotConverge(format!(
            "initial guess must have finite k > 0 and finite a (k={k0}, a={a0})"
        )));
    }
    let mut theta = Vector2::new(k0.ln(), a0);
    let mut sse = sse_at(&xs, &ys, &theta, r);
    if !sse.is_finite() {
        return Err(FitError::FitDidNotConverge(format!(
            "objective is not finite at the initial guess (k={k0}, a={a0})"
        )));
    }
    debug!(k = k0, a = a0, sse, "power-law fit: initial guess");

    let sse_floor = SSE_REL_FLOOR * ys.iter().map(|y| y * y).sum::<f64>();
    let mut lambda = LAMBDA_INIT;
    let mut nu = 2.0;
    let mut iterations = 0usize;
    let mut converged = sse <= sse_floor;
    let (mut jtj, mut jte) = normal_equations(&xs, &ys, &theta, r);

    while !converged {
        if gradient_cosine(&jtj, &jte, sse) <= GTOL {
            break;
        }
        if iterations >= opts.max_iterations {
            return Err(FitError::FitDidNotConverge(format!(
                "iteration budget of {} exhausted (k={:.6e}, a={:.6}, sse={sse:.3e})",
                opts.max_iterations,
                theta[0].exp(),
                theta[1]
            )));
        }
        iterations += 1;

        let diag = Vector2::new(jtj[(0, 0)].max(DIAG_FLOOR), jtj[(1, 1)].max(DIAG_FLOOR));
        let Some(step) = damped_step(&jtj, &jte, &diag, lambda) else {
            lambda *= nu;
            nu *= 2.0;
            if lambda > LAMBDA_MAX {
                return Err(FitError::FitDidNotConverge(
                    "damped normal equations are singular".to_string(),
                ));
            }
            continue;
        };

        let rel_step = step.norm() / (theta.norm() + XTOL);
        let candidate = theta + step;
        let sse_new = sse_at(&xs, &ys, &candidate, r);
        // Reduction predicted by the damped linear model.
        let predicted = step.dot(&(diag.component_mul(&step) * lambda + jte));

        if sse_new.is_finite() && sse_new < sse && predicted > 0.0 {
            let rho = (sse - sse_new) / predicted;
            let rel_drop = (sse - sse_new) / sse;
            theta = candidate;
            sse = sse_new;
            lambda = (lambda * (1.0 / 3.0_f64).max(1.0 - (2.0 * rho - 1.0).powi(3))).max(LAMBDA_MIN);
            nu = 2.0;
            debug!(iterations, ln_k = theta[0], a = theta[1], sse, lambda, "power-law fit: accepted step");

            converged = sse <= sse_floor || rel_drop <= FTOL || rel_step <= XTOL;
            if !converged {
                (jtj, jte) = normal_equations(&xs, &ys, &theta, r);
            }
        } else if rel_step <= XTOL {
            // No representable improvement left at this precision.
            converged = true;
        } else {
            lambda *= nu;
            nu *= 2.0;
            if lambda > LAMBDA_MAX {
                return Err(FitError::FitDidNotConverge(format!(
                    "damping diverged without improving the objective (sse={sse:.3e})"
                )));
            }
        }
    }

    let (k, a) = (theta[0].exp(), theta[1]);
    if !(k.is_finite() && a.is_finite() && k > 0.0) {
        return Err(FitError::FitDidNotConverge(format!(
            "fitted scale must be finite and positive (k={k}, a={a})"
        )));
    }

    let covariance = covariance(&xs, k, a, r, sse)?;
    debug!(iterations, k, a, sse, "power-law fit: converged");

    Ok(FittedModel {
        k,
        a,
        r,
        covariance,
        iterations,
    })
}

fn count_distinct(points: &[AggregatedPoint]) -> usize {
    let mut xs: Vec<f64> = points.iter().map(|p| p.physical).collect();
    xs.sort_by(f64::total_cmp);
    xs.dedup();
    xs.len()
}

fn initial_params(guess: InitialGuess, xs: &[f64], ys: &[f64], r: f64) -> (f64, f64) {
    match guess {
        InitialGuess::Unit => (1.0, 1.0),
        InitialGuess::Explicit { k, a } => (k, a),
        InitialGuess::LogLinear => log_linear_guess(xs, ys, r).unwrap_or_else(|| {
            debug!("log-linear initial guess unavailable, starting from k=1, a=1");
            (1.0, 1.0)
        }),
    }
}

/// `ln y = ln(k·r) + a ln x`, so `k = exp(intercept) / r`.
fn log_linear_guess(xs: &[f64], ys: &[f64], r: f64) -> Option<(f64, f64)> {
    if ys.iter().any(|&y| y <= 0.0) {
        return None;
    }
    let ln_x: Vec<f64> = xs.iter().map(|x| x.ln()).collect();
    let ln_y: Vec<f64> = ys.iter().map(|y| y.ln()).collect();
    let (intercept, slope) = fit_line(&ln_x, &ln_y)?;
    let k = intercept.exp() / r;
    (k.is_finite() && k > 0.0 && slope.is_finite()).then_some((k, slope))
}

/// Objective at `theta = (ln k, a)`.
fn sse_at(xs: &[f64], ys: &[f64], theta: &Vector2<f64>, r: f64) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| {
            let e = y - predict_ln_k(theta[0], theta[1], r, x);
            e * e
        })
        .sum()
}

/// `JᵀJ` and `Jᵀe` in `(ln k, a)` for residuals `e = y - f(x)`.
fn normal_equations(xs: &[f64], ys: &[f64], theta: &Vector2<f64>, r: f64) -> (Matrix2<f64>, Vector2<f64>) {
    let mut jtj = Matrix2::zeros();
    let mut jte = Vector2::zeros();
    for (&x, &y) in xs.iter().zip(ys) {
        let g = Vector2::from(gradient_ln_k(theta[0], theta[1], r, x));
        let e = y - predict_ln_k(theta[0], theta[1], r, x);
        jtj += g * g.transpose();
        jte += g * e;
    }
    (jtj, jte)
}

/// Largest `|Jⱼᵀe| / (‖Jⱼ‖ ‖e‖)`: zero when the residual is orthogonal to every column.
fn gradient_cosine(jtj: &Matrix2<f64>, jte: &Vector2<f64>, sse: f64) -> f64 {
    let e_norm = sse.sqrt();
    (0..ESTIMATED_PARAMS)
        .map(|i| {
            let col_norm = jtj[(i, i)].sqrt();
            if col_norm > 0.0 && e_norm > 0.0 {
                jte[i].abs() / (col_norm * e_norm)
            } else {
                0.0
            }
        })
        .fold(0.0, f64::max)
}

/// Solve `(JᵀJ + λ diag(JᵀJ)) δ = Jᵀe`.
fn damped_step(
    jtj: &Matrix2<f64>,
    jte: &Vector2<f64>,
    diag: &Vector2<f64>,
    lambda: f64,
) -> Option<Vector2<f64>> {
    let mut damped = *jtj;
    for i in 0..ESTIMATED_PARAMS {
        damped[(i, i)] += lambda * diag[i];
    }
    let step = damped.try_inverse()? * jte;
    step.iter().all(|v| v.is_finite()).then_some(step)
}

/// `(JᵀJ)⁻¹ · SSE / (n - p)` in `(k, a)`, embedded in `(k, a, r)` order.
fn covariance(xs: &[f64], k: f64, a: f64, r: f64, sse: f64) -> Result<[[f64; 3]; 3], FitError> {
    let mut jtj = Matrix2::zeros();
    for &x in xs {
        let g = Vector2::from(gradient(k, a, r, x));
        jtj += g * g.transpose();
    }

    // Relative conditioning check: `try_inverse` only rejects an exactly zero determinant.
    let scale = jtj[(0, 0)] * jtj[(1, 1)];
    if !(jtj.determinant() > scale * 1e-14) {
        return Err(FitError::FitDidNotConverge(
            "covariance is undefined: JᵀJ is singular".to_string(),
        ));
    }
    let inv = jtj.try_inverse().ok_or_else(|| {
        FitError::FitDidNotConverge("covariance is undefined: JᵀJ is singular".to_string())
    })?;

    let dof = xs.len().saturating_sub(ESTIMATED_PARAMS).max(1) as f64;
    let s2 = sse / dof;
    let mut cov = [[0.0; 3]; 3];
    for i in 0..ESTIMATED_PARAMS {
        for j in 0..ESTIMATED_PARAMS {
            cov[i][j] = inv[(i, j)] * s2;
        }
    }
    if cov.iter().flatten().any(|v| !v.is_finite()) {
        return Err(FitError::FitDidNotConverge(
            "covariance is undefined: non-finite entries".to_string(),
        ));
    }
    Ok(cov)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::predict;

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
    fn identity_scenario_recovers_unit_exponent() {
        let pts = points(&[1.0, 2.0, 4.0, 8.0], &[1.0, 2.0, 4.0, 8.0]);
        let model = fit_power_law(&pts, &FitOptions::default()).unwrap();
        assert!((model.a - 1.0).abs() < 1e-3, "a = {}", model.a);
        assert!((model.effective_scale() - 1.0).abs() < 1e-3);
        assert_eq!(model.r, 1.0);
    }

    #[test]
    fn unit_guess_converges_on_curved_data() {
        let xs = [0.5, 1.0, 2.0, 3.0, 5.0, 8.0];
        let ys: Vec<f64> = xs.iter().map(|&x| predict(2.0, 0.5, 1.0, x)).collect();
        let opts = FitOptions {
            initial_guess: InitialGuess::Unit,
            ..FitOptions::default()
        };
        let model = fit_power_law(&points(&xs, &ys), &opts).unwrap();
        assert!((model.k - 2.0).abs() < 1e-6, "k = {}", model.k);
        assert!((model.a - 0.5).abs() < 1e-6, "a = {}", model.a);
        assert!(model.iterations > 0);
    }

    #[test]
    fn noisy_data_gives_finite_covariance() {
        let xs = [1.0, 2.0, 3.0, 4.0, 6.0, 8.0];
        let noise = [1.05, 0.97, 1.02, 0.95, 1.04, 0.99];
        let ys: Vec<f64> = xs
            .iter()
            .zip(noise)
            .map(|(&x, m)| predict(1.2, 0.7, 1.0, x) * m)
            .collect();
        let model = fit_power_law(&points(&xs, &ys), &FitOptions::default()).unwrap();
        assert!((model.a - 0.7).abs() < 0.1);
        let se = model.std_errors();
        assert!(se[0] > 0.0 && se[0].is_finite());
        assert!(se[1] > 0.0 && se[1].is_finite());
        assert_eq!(se[2], 0.0);
        assert_eq!(model.covariance[0][1], model.covariance[1][0]);
    }

    #[test]
    fn calibration_constant_only_moves_k() {
        let xs = [1.0, 2.0, 4.0, 8.0];
        let ys: Vec<f64> = xs.iter().map(|&x| predict(3.0, 0.6, 1.0, x)).collect();
        let opts = FitOptions {
            r_fixed: 2.0,
            ..FitOptions::default()
        };
        let model = fit_power_law(&points(&xs, &ys), &opts).unwrap();
        assert!((model.k - 1.5).abs() < 1e-6);
        assert!((model.effective_scale() - 3.0).abs() < 1e-6);
        assert!((model.a - 0.6).abs() < 1e-6);
    }

    #[test]
    fn fewer_than_three_points_is_insufficient() {
        let pts = points(&[2.0], &[1.7]);
        assert_eq!(
            fit_power_law(&pts, &FitOptions::default()),
            Err(FitError::InsufficientData { have: 1, need: 3 })
        );
        let pts = points(&[1.0, 2.0, 2.0], &[1.0, 2.0, 2.1]);
        assert_eq!(
            fit_power_law(&pts, &FitOptions::default()),
            Err(FitError::InsufficientData { have: 2, need: 3 })
        );
    }

    #[test]
    fn tiny_budget_reports_non_convergence() {
        let xs = [0.5, 1.0, 2.0, 3.0, 5.0, 8.0];
        let ys: Vec<f64> = xs.iter().map(|&x| predict(2.0, 0.5, 1.0, x)).collect();
        let opts = FitOptions {
            initial_guess: InitialGuess::Unit,
            max_iterations: 1,
            ..FitOptions::default()
        };
        assert!(matches!(
            fit_power_law(&points(&xs, &ys), &opts),
            Err(FitError::FitDidNotConverge(_))
        ));
    }

    #[test]
    fn non_positive_distance_is_invalid() {
        let pts = points(&[0.0, 1.0, 2.0], &[1.0, 1.0, 2.0]);
        assert!(matches!(
            fit_power_law(&pts, &FitOptions::default()),
            Err(FitError::InvalidObservation(_))
        ));
    }

    fn sse(pts: &[AggregatedPoint], model: &FittedModel) -> f64 {
        pts.iter()
            .map(|p| (p.representative - model.predict(p.physical)).powi(2))
            .sum()
    }

    #[test]
    fn steep_data_reaches_the_valley_floor() {
        // Best fit has a ≈ 4.95 with k ≈ 2.8e-7: in (k, a) this is a long curved valley.
        let pts = points(&[0.387, 35.28, 37.95], &[0.468, 12.78, 18.34]);
        let model = fit_power_law(&pts, &FitOptions::default()).unwrap();
        assert!((model.a - 4.951).abs() < 0.01, "a = {}", model.a);
        assert!(sse(&pts, &model) < 0.2191, "sse = {}", sse(&pts, &model));
        assert!(model.k > 0.0 && model.k < 1e-6, "k = {}", model.k);
    }

    #[test]
    fn unit_guess_handles_small_scale_data() {
        let pts = points(&[0.001, 0.002, 0.004], &[1e-6, 5e-6, 2e-6]);
        let opts = FitOptions {
            initial_guess: InitialGuess::Unit,
            ..FitOptions::default()
        };
        let model = fit_power_law(&pts, &opts).unwrap();
        assert!((model.a - 0.188).abs() < 0.01, "a = {}", model.a);
        assert!(sse(&pts, &model) < 8.33e-12, "sse = {}", sse(&pts, &model));
    }

    #[test]
    fn exact_fit_floor_is_relative_to_the_data() {
        // Same noisy curve in units 1e13 times smaller: an absolute SSE floor
        // would accept the log-linear start for the small copy.
        let xs = [1.0, 2.0, 4.0, 8.0];
        let noise = [1.05, 0.97, 1.02, 0.95];
        let ys: Vec<f64> = xs
            .iter()
            .zip(noise)
            .map(|(&x, m)| predict(3.0, 0.5, 1.0, x) * m)
            .collect();
        let tiny: Vec<f64> = ys.iter().map(|y| y * 1e-13).collect();

        let big = fit_power_law(&points(&xs, &ys), &FitOptions::default()).unwrap();
        let small = fit_power_law(&points(&xs, &tiny), &FitOptions::default()).unwrap();
        assert!(small.iterations > 0);
        assert!((big.a - small.a).abs() < 1e-9, "{} vs {}", big.a, small.a);
        assert!((small.k / (big.k * 1e-13) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn invalid_calibration_is_a_configuration_error() {
        let opts = FitOptions {
            r_fixed: 0.0,
            ..FitOptions::default()
        };
        assert_eq!(opts.validate().unwrap_err().exit_code(), 2);
        let pts = points(&[1.0, 2.0, 4.0], &[1.0, 2.0, 4.0]);
        assert!(matches!(
            fit_power_law(&pts, &opts),
            Err(FitError::InvalidObservation(_))
        ));

        let opts = FitOptions {
            initial_guess: InitialGuess::Explicit { k: -1.0, a: 1.0 },
            ..FitOptions::default()
        };
        assert!(opts.validate().is_err());
        assert!(FitOptions::default().validate().is_ok());
    }
}
