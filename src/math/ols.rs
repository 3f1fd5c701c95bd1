//! Linear least squares solver.
//!
//! The power-law fitter seeds its nonlinear search with a straight-line fit in
//! log-log space:
//!
//! ```text
//! minimize Σ (ln y_i - (c + a ln x_i))^2
//! ```
//!
//! Implementation choices:
//! - SVD rather than QR: nalgebra's `QR::solve` is intended for square systems
//!   and panics for tall design matrices.
//! - The system has two columns, so the SVD is cheap.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Progressively looser tolerances; distances that cluster tightly make the
    // `ln x` column nearly collinear with the intercept.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit `y = c + slope * x` and return `(c, slope)`.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mut design = DMatrix::<f64>::zeros(xs.len(), 2);
    for (i, &x) in xs.iter().enumerate() {
        design[(i, 0)] = 1.0;
        design[(i, 1)] = x;
    }
    let beta = solve_least_squares(&design, &DVector::from_row_slice(ys))?;
    Some((beta[0], beta[1]))
}
