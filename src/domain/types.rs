//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - used in-memory during aggregation and fitting
//! - exported to JSON/CSV
//! - reloaded later for plotting

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Presentation angle in whole degrees, `0..360`.
///
/// This is the group key of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Angle(u16);

impl Angle {
    pub fn from_degrees(degrees: u16) -> Option<Self> {
        (degrees < 360).then_some(Self(degrees))
    }

    pub fn degrees(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.0)
    }
}

/// Lookup table from categorical angle codes (as stored in the data files) to angles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AngleCodes {
    table: BTreeMap<u32, Angle>,
}

impl AngleCodes {
    /// Build a table from `(code, degrees)` pairs. Returns `None` if any angle is out of range.
    pub fn from_pairs(pairs: &[(u32, u16)]) -> Option<Self> {
        let mut table = BTreeMap::new();
        for &(code, degrees) in pairs {
            table.insert(code, Angle::from_degrees(degrees)?);
        }
        Some(Self { table })
    }

    pub fn angle(&self, code: u32) -> Option<Angle> {
        self.table.get(&code).copied()
    }

    /// Reverse lookup, used when writing coded files.
    pub fn code(&self, angle: Angle) -> Option<u32> {
        self.table
            .iter()
            .find_map(|(&code, &a)| (a == angle).then_some(code))
    }

    pub fn angles(&self) -> impl Iterator<Item = Angle> + '_ {
        self.table.values().copied()
    }
}

impl Default for AngleCodes {
    /// Eight directions in 45° steps, coded `1..=8`.
    fn default() -> Self {
        let table = (0u16..8)
            .map(|i| (u32::from(i) + 1, Angle(i * 45)))
            .collect();
        Self { table }
    }
}

/// How the `angle` column of an input file is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AngleEncoding {
    /// Categorical codes translated through [`AngleCodes`].
    Code,
    /// Whole degrees.
    Degrees,
}

/// Which judgments enter the fit, split on the rating threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Cohort {
    All,
    Expert,
    NonExpert,
}

impl Cohort {
    pub fn admits(self, obs: &Observation, expert_threshold: f64) -> bool {
        match self {
            Cohort::All => true,
            Cohort::Expert => obs.is_expert(expert_threshold),
            Cohort::NonExpert => !obs.is_expert(expert_threshold),
        }
    }
}

/// Starting-point policy for the nonlinear fit (CLI-facing subset of `fit::InitialGuess`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GuessMode {
    /// Ordinary least squares on `ln y = ln(k·r) + a·ln x`.
    LogLinear,
    /// `k = 1`, `a = 1`.
    Unit,
}

/// One distance judgment.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub angle: Angle,
    /// Physical distance of the stimulus (independent variable).
    pub physical: f64,
    /// Distance reported by the subject (dependent variable).
    pub perceived: f64,
    /// Ordinal self-rated expertise / confidence.
    pub rating: f64,
    pub participant: Option<String>,
}

impl Observation {
    pub fn is_expert(&self, threshold: f64) -> bool {
        self.rating >= threshold
    }
}

/// All observations sharing one angle.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationGroup {
    pub angle: Angle,
    pub observations: Vec<Observation>,
}

/// One physical distance within a group, reduced to its geometric mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPoint {
    pub physical: f64,
    pub representative: f64,
    /// Number of judgments behind `representative`.
    pub count: usize,
}

/// Fitted `y = k · x^a · r`.
///
/// `k` and `r` enter only as a product; `r` is held at the calibration value the
/// fit was run with and only [`FittedModel::effective_scale`] is identifiable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub k: f64,
    pub a: f64,
    pub r: f64,
    /// Parameter covariance in `(k, a, r)` order. The `r` row and column are zero.
    pub covariance: [[f64; 3]; 3],
    pub iterations: usize,
}

impl FittedModel {
    pub fn predict(&self, x: f64) -> f64 {
        crate::models::predict(self.k, self.a, self.r, x)
    }

    pub fn effective_scale(&self) -> f64 {
        self.k * self.r
    }

    /// Standard errors (square roots of the covariance diagonal).
    pub fn std_errors(&self) -> [f64; 3] {
        [0, 1, 2].map(|i| self.covariance[i][i].max(0.0).sqrt())
    }
}

/// Goodness-of-fit diagnostics for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// Linear-scale coefficient of determination.
    pub r_squared: f64,
    /// Linear-scale root mean squared residual.
    pub rmse: f64,
    /// `ln(representative) - ln(predicted)`, one per aggregated point.
    pub log_residuals: Vec<f64>,
    /// Root mean square of `log_residuals`.
    pub log_rms: f64,
}

/// The fitted curve sampled for display.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CurveSample {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Successful result for one angle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupFit {
    pub points: Vec<AggregatedPoint>,
    pub model: FittedModel,
    pub diagnostics: FitDiagnostics,
    pub curve: CurveSample,
}

/// Why an angle could not be fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupFailure {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupStatus {
    Fitted(GroupFit),
    Failed(GroupFailure),
}

/// Result slot for one angle: a fit or the reason there is none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupOutcome {
    pub angle: Angle,
    pub n_observations: usize,
    pub n_expert: usize,
    pub status: GroupStatus,
}

impl GroupOutcome {
    pub fn fit(&self) -> Option<&GroupFit> {
        match &self.status {
            GroupStatus::Fitted(fit) => Some(fit),
            GroupStatus::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&GroupFailure> {
        match &self.status {
            GroupStatus::Fitted(_) => None,
            GroupStatus::Failed(failure) => Some(failure),
        }
    }
}

/// Mean and population standard deviation of a per-angle scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub n: usize,
    pub mean: f64,
    pub std_dev: f64,
}

/// Pooled log-scale residuals across every fitted angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualSummary {
    pub n: usize,
    pub mean: f64,
    pub rms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedGroup {
    pub angle: Angle,
    pub kind: ErrorKind,
    pub message: String,
}

/// Cross-angle summary.
///
/// Statistics cover fitted angles only; every other angle is listed in `failures`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusSummary {
    pub groups_total: usize,
    pub groups_fitted: usize,
    pub failures: Vec<FailedGroup>,
    pub r_squared: Option<Distribution>,
    pub exponent: Option<Distribution>,
    pub scale: Option<Distribution>,
    pub effective_scale: Option<Distribution>,
    pub log_residuals: Option<ResidualSummary>,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub data_path: PathBuf,
    pub angle_encoding: AngleEncoding,
    pub angle_codes: AngleCodes,
    pub expert_threshold: f64,
    pub cohort: Cohort,
    pub participant: Option<String>,

    pub guess: GuessMode,
    /// Calibration constant `r`, held fixed during the fit.
    pub r_fixed: f64,
    pub max_iterations: usize,
    pub curve_points: usize,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_points: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

/// Settings echoed into the results file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    pub data: String,
    pub angle_encoding: AngleEncoding,
    pub expert_threshold: f64,
    pub cohort: Cohort,
    pub participant: Option<String>,
    pub guess: GuessMode,
    pub r_fixed: f64,
    pub max_iterations: usize,
}

impl From<&FitConfig> for RunSettings {
    fn from(config: &FitConfig) -> Self {
        Self {
            data: config.data_path.display().to_string(),
            angle_encoding: config.angle_encoding,
            expert_threshold: config.expert_threshold,
            cohort: config.cohort,
            participant: config.participant.clone(),
            guess: config.guess,
            r_fixed: config.r_fixed,
            max_iterations: config.max_iterations,
        }
    }
}

/// A saved run (JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub settings: RunSettings,
    pub groups: Vec<GroupOutcome>,
    pub summary: CorpusSummary,
}
