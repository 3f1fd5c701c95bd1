//! Evaluation of `f(x) = k · x^a · r`.
//!
//! The fitter relies on two primitive operations:
//! - predict `f(x)` for given parameters (residuals, plots)
//! - the partial derivatives with respect to the estimated parameters, either
//!   `(k, a)` (covariance) or `(ln k, a)` (the optimizer's search space)
//!
//! `r` is a calibration constant and never differentiated: it only enters as a
//! product with `k`, so `∂f/∂r` is collinear with `∂f/∂k`.

/// Predict `f(x)`.
pub fn predict(k: f64, a: f64, r: f64, x: f64) -> f64 {
    k * x.powf(a) * r
}

/// Gradient `[∂f/∂k, ∂f/∂a]` at `x`.
///
/// Requires `x > 0` (the `ln x` term).
pub fn gradient(k: f64, a: f64, r: f64, x: f64) -> [f64; 2] {
    let xa = x.powf(a);
    [r * xa, k * r * xa * x.ln()]
}

/// Predict `f(x)` with the scale given as `ln k`.
pub fn predict_ln_k(ln_k: f64, a: f64, r: f64, x: f64) -> f64 {
    (ln_k + a * x.ln()).exp() * r
}

/// Gradient `[∂f/∂ln k, ∂f/∂a]` at `x`; both columns are `f`-proportional.
pub fn gradient_ln_k(ln_k: f64, a: f64, r: f64, x: f64) -> [f64; 2] {
    let f = predict_ln_k(ln_k, a, r, x);
    [f, f * x.ln()]
}
