//! Sample moments used by the diagnostics and the cross-angle summary.
//!
//! All functions return `None` for empty input instead of `NaN`, so callers
//! must decide what an undefined statistic means for them.

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`, not `n - 1`).
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Root mean square.
pub fn rms(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some((values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moments_of_small_sample() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&v), Some(5.0));
        assert_eq!(population_std_dev(&v), Some(2.0));
    }

    #[test]
    fn empty_is_undefined() {
        assert_eq!(mean(&[]), None);
        assert_eq!(population_std_dev(&[]), None);
        assert_eq!(rms(&[]), None);
    }

    #[test]
    fn rms_of_symmetric_values() {
        let r = rms(&[-3.0, 3.0, -3.0, 3.0]).unwrap();
        assert!((r - 3.0).abs() < 1e-12);
    }
}
