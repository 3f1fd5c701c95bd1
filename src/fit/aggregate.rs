//! Grouping by angle and geometric-mean aggregation per physical distance.
//!
//! Judgment error in perceived distance is multiplicative (log-normal), so the
//! central tendency of repeated judgments is the geometric mean
//! `exp(mean(ln y))`, not the arithmetic mean.

use std::collections::BTreeMap;

use crate::domain::{AggregatedPoint, Angle, Observation, ObservationGroup};
use crate::error::FitError;

/// Partition observations by angle, ordered by angle ascending.
pub fn group_by_angle(observations: &[Observation]) -> Vec<ObservationGroup> {
    let mut groups: BTreeMap<Angle, Vec<Observation>> = BTreeMap::new();
    for obs in observations {
        groups.entry(obs.angle).or_default().push(obs.clone());
    }
    groups
        .into_iter()
        .map(|(angle, observations)| ObservationGroup { angle, observations })
        .collect()
}

/// Geometric mean of strictly positive values.
///
/// Computed in log space to avoid overflow/underflow of the running product.
pub fn geometric_mean(values: &[f64]) -> Result<f64, FitError> {
    if values.is_empty() {
        return Err(FitError::EmptyGroup);
    }
    let mut sum_ln = 0.0;
    for &v in values {
        if !(v.is_finite() && v > 0.0) {
            return Err(FitError::InvalidObservation(format!(
                "geometric mean requires positive values, got {v}"
            )));
        }
        sum_ln += v.ln();
    }
    Ok((sum_ln / values.len() as f64).exp())
}

/// Reduce a group to one point per distinct physical distance, sorted ascending.
pub fn aggregate(group: &ObservationGroup) -> Result<Vec<AggregatedPoint>, FitError> {
    if group.observations.is_empty() {
        return Err(FitError::EmptyGroup);
    }

    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(group.observations.len());
    for obs in &group.observations {
        if !(obs.physical.is_finite() && obs.physical > 0.0) {
            return Err(FitError::InvalidObservation(format!(
                "angle {}: physical distance must be positive, got {}",
                group.angle, obs.physical
            )));
        }
        if !(obs.perceived.is_finite() && obs.perceived > 0.0) {
            return Err(FitError::InvalidObservation(format!(
                "angle {}: perceived distance must be positive, got {} at physical distance {}",
                group.angle, obs.perceived, obs.physical
            )));
        }
        pairs.push((obs.physical, obs.perceived));
    }

    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    pairs
        .chunk_by(|a, b| a.0 == b.0)
        .map(|chunk| {
            let values: Vec<f64> = chunk.iter().map(|&(_, y)| y).collect();
            Ok(AggregatedPoint {
                physical: chunk[0].0,
                representative: geometric_mean(&values)?,
                count: chunk.len(),
            })
        })
        .collect()
}
