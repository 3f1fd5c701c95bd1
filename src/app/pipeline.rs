//! Shared "fit pipeline" logic.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! observations -> groups by angle -> (per angle) aggregate -> fit -> diagnose
//! -> corpus summary
//!
//! Per-angle work is independent, so groups are processed in parallel; the
//! summary is reduced afterwards from the collected outcomes.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::{
    CorpusSummary, FitConfig, GroupFailure, GroupFit, GroupOutcome, GroupStatus, Observation,
    ObservationGroup,
};
use crate::error::{AppError, FitError};
use crate::fit::{FitOptions, aggregate, diagnose, fit_power_law, group_by_angle, sample_curve};
use crate::io::ingest::{IngestOptions, IngestedData, load_observations};

/// Options for the per-group map step.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub fit: FitOptions,
    pub expert_threshold: f64,
    /// Number of samples of the fitted curve kept for display.
    pub curve_points: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            fit: FitOptions::default(),
            expert_threshold: 4.0,
            curve_points: 100,
        }
    }
}

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// The observation groups, sorted by angle (kept for plotting raw judgments).
    pub groups: Vec<ObservationGroup>,
    /// One outcome per group, sorted by angle.
    pub outcomes: Vec<GroupOutcome>,
    pub summary: CorpusSummary,
}

impl RunOutput {
    pub fn group(&self, outcome: &GroupOutcome) -> Option<&ObservationGroup> {
        self.groups.iter().find(|g| g.angle == outcome.angle)
    }
}

/// Load the CSV named in `config` and run the pipeline on it.
pub fn run_fit(config: &FitConfig) -> Result<(IngestedData, RunOutput), AppError> {
    let ingest = load_observations(&config.data_path, &IngestOptions::from(config))?;
    let options = PipelineOptions {
        fit: FitOptions {
            initial_guess: config.guess.into(),
            r_fixed: config.r_fixed,
            max_iterations: config.max_iterations,
        },
        expert_threshold: config.expert_threshold,
        curve_points: config.curve_points,
    };
    let run = run_pipeline(&ingest.observations, &options)?;
    Ok((ingest, run))
}

/// Run aggregation, fitting and diagnostics for every angle.
///
/// Group-level failures are recorded in their outcome slot; the only fatal
/// conditions are invalid fit options and having no groups at all.
pub fn run_pipeline(observations: &[Observation], options: &PipelineOptions) -> Result<RunOutput, AppError> {
    options.fit.validate()?;
    let groups = group_by_angle(observations);
    if groups.is_empty() {
        return Err(AppError::new(3, "No observations to fit: zero angle groups."));
    }

    let mut outcomes: Vec<GroupOutcome> = groups
        .par_iter()
        .map(|group| process_group(group, options))
        .collect();
    outcomes.sort_by_key(|o| o.angle);

    let summary = CorpusSummary::from_outcomes(&outcomes);
    info!(
        groups = summary.groups_total,
        fitted = summary.groups_fitted,
        failed = summary.failures.len(),
        "pipeline finished"
    );

    Ok(RunOutput {
        groups,
        outcomes,
        summary,
    })
}

/// Aggregate, fit and diagnose a single angle.
pub fn process_group(group: &ObservationGroup, options: &PipelineOptions) -> GroupOutcome {
    let n_expert = group
        .observations
        .iter()
        .filter(|o| o.is_expert(options.expert_threshold))
        .count();

    let status = match fit_group(group, options) {
        Ok(fit) => {
            info!(
                angle = group.angle.degrees(),
                k = fit.model.k,
                a = fit.model.a,
                r_squared = fit.diagnostics.r_squared,
                "angle fitted"
            );
            GroupStatus::Fitted(fit)
        }
        Err(err) => {
            warn!(angle = group.angle.degrees(), kind = err.kind().label(), "angle not fitted: {err}");
            GroupStatus::Failed(GroupFailure {
                kind: err.kind(),
                message: err.to_string(),
            })
        }
    };

    GroupOutcome {
        angle: group.angle,
        n_observations: group.observations.len(),
        n_expert,
        status,
    }
}

fn fit_group(group: &ObservationGroup, options: &PipelineOptions) -> Result<GroupFit, FitError> {
    let points = aggregate(group)?;
    let model = fit_power_law(&points, &options.fit)?;
    let diagnostics = diagnose(&points, &model)?;

    // Points are sorted by physical distance.
    let x_min = points.first().map(|p| p.physical).unwrap_or(0.0);
    let x_max = points.last().map(|p| p.physical).unwrap_or(0.0);
    let curve = sample_curve(&model, x_min, x_max, options.curve_points);

    Ok(GroupFit {
        points,
        model,
        diagnostics,
        curve,
    })
}
