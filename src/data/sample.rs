//! Synthetic perceived-distance judgments with a known per-angle power law.
//!
//! Each angle gets its own ground truth: viewing away from straight ahead
//! compresses the exponent and raises the scale,
//!
//!   a(θ) = 0.8 - 0.3 · (1 - cos θ) / 2
//!   k(θ) = 1.0 + 0.4 · (1 - cos θ) / 2
//!
//! and each judgment is `k · x^a` times log-normal noise `exp(σ·z)`.
//! The median of the noise is 1, so geometric means recover the truth.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{Angle, AngleCodes, Observation};
use crate::error::AppError;

/// Knobs for the synthetic dataset.
#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub participants: usize,
    /// Physical distances presented at every angle.
    pub distances: Vec<f64>,
    /// Judgments per participant per (angle, distance).
    pub repeats: usize,
    /// Standard deviation of the log-scale noise.
    pub noise_sigma: f64,
    pub seed: u64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            participants: 12,
            distances: vec![1.0, 2.0, 4.0, 8.0, 16.0],
            repeats: 1,
            noise_sigma: 0.15,
            seed: 42,
        }
    }
}

/// Parameters the sampler used for one angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleTruth {
    pub angle: Angle,
    pub k: f64,
    pub a: f64,
}

impl SampleTruth {
    pub fn for_angle(angle: Angle) -> Self {
        let off_axis = (1.0 - f64::from(angle.degrees()).to_radians().cos()) / 2.0;
        Self {
            angle,
            k: 1.0 + 0.4 * off_axis,
            a: 0.8 - 0.3 * off_axis,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SampleData {
    pub observations: Vec<Observation>,
    /// One entry per angle, in angle order.
    pub truth: Vec<SampleTruth>,
}

/// Generate judgments for every angle in `codes`.
///
/// Each participant gets a fixed self-rating in `1..=5`.
pub fn generate_sample(config: &SampleConfig, codes: &AngleCodes) -> Result<SampleData, AppError> {
    if config.participants == 0 || config.repeats == 0 {
        return Err(AppError::new(2, "Participants and repeats must be > 0."));
    }
    if config.distances.is_empty() {
        return Err(AppError::new(2, "At least one distance is required."));
    }
    if config.distances.iter().any(|d| !(d.is_finite() && *d > 0.0)) {
        return Err(AppError::new(2, "Distances must be finite and > 0."));
    }
    if !(config.noise_sigma.is_finite() && config.noise_sigma >= 0.0) {
        return Err(AppError::new(2, "Noise sigma must be finite and >= 0."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let ratings: Vec<f64> = (0..config.participants)
        .map(|_| f64::from(rng.gen_range(1u8..=5)))
        .collect();

    let truth: Vec<SampleTruth> = codes.angles().map(SampleTruth::for_angle).collect();

    let mut observations = Vec::with_capacity(
        truth.len() * config.distances.len() * config.participants * config.repeats,
    );
    for t in &truth {
        for (p, &rating) in ratings.iter().enumerate() {
            let participant = format!("P{:02}", p + 1);
            for &x in &config.distances {
                for _ in 0..config.repeats {
                    let z: f64 = normal.sample(&mut rng);
                    observations.push(Observation {
                        angle: t.angle,
                        physical: x,
                        perceived: t.k * x.powf(t.a) * (config.noise_sigma * z).exp(),
                        rating,
                        participant: Some(participant.clone()),
                    });
                }
            }
        }
    }

    info!(
        observations = observations.len(),
        angles = truth.len(),
        seed = config.seed,
        "generated synthetic sample"
    );

    Ok(SampleData { observations, truth })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truth_is_symmetric_and_straight_ahead_is_least_compressed() {
        let front = SampleTruth::for_angle(Angle::from_degrees(0).unwrap());
        let back = SampleTruth::for_angle(Angle::from_degrees(180).unwrap());
        let left = SampleTruth::for_angle(Angle::from_degrees(90).unwrap());
        let right = SampleTruth::for_angle(Angle::from_degrees(270).unwrap());

        assert!((front.a - 0.8).abs() < 1e-12);
        assert!((front.k - 1.0).abs() < 1e-12);
        assert!((back.a - 0.5).abs() < 1e-12);
        assert!((back.k - 1.4).abs() < 1e-12);
        assert!((left.a - right.a).abs() < 1e-12);
        assert!((left.k - right.k).abs() < 1e-12);
    }

    #[test]
    fn same_seed_same_sample() {
        let codes = AngleCodes::default();
        let cfg = SampleConfig::default();
        let a = generate_sample(&cfg, &codes).unwrap();
        let b = generate_sample(&cfg, &codes).unwrap();
        assert_eq!(a.observations, b.observations);
        assert_eq!(a.truth.len(), 8);
        assert_eq!(a.observations.len(), 8 * 5 * 12);
    }

    #[test]
    fn zero_noise_reproduces_truth() {
        let cfg = SampleConfig {
            noise_sigma: 0.0,
            participants: 2,
            ..SampleConfig::default()
        };
        let data = generate_sample(&cfg, &AngleCodes::default()).unwrap();
        for obs in &data.observations {
            let t = SampleTruth::for_angle(obs.angle);
            let expected = t.k * obs.physical.powf(t.a);
            assert!((obs.perceived - expected).abs() < 1e-12);
            assert!((1.0..=5.0).contains(&obs.rating));
        }
    }

    #[test]
    fn rejects_bad_config() {
        let codes = AngleCodes::default();
        let cfg = SampleConfig {
            distances: vec![1.0, 0.0],
            ..SampleConfig::default()
        };
        assert_eq!(generate_sample(&cfg, &codes).unwrap_err().exit_code(), 2);

        let cfg = SampleConfig {
            participants: 0,
            ..SampleConfig::default()
        };
        assert_eq!(generate_sample(&cfg, &codes).unwrap_err().exit_code(), 2);
    }
}
