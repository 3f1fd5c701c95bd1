//! Command-line parsing for the perceived-distance fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{AngleEncoding, Cohort, GuessMode};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "pdfit", version, about = "Per-angle power-law fits of perceived distance")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every angle of a judgments CSV, print diagnostics, and optionally plot/export.
    Fit(FitArgs),
    /// Write a synthetic judgments CSV with known per-angle parameters.
    Sample(SampleArgs),
    /// Plot a previously exported results JSON.
    Plot(PlotArgs),
}

/// Options for fitting.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Judgments CSV (angle, physical/perceived distance, ratings, participant).
    #[arg(short = 'd', long, env = "PDFIT_DATA", value_name = "CSV")]
    pub data: PathBuf,

    /// How the angle column is encoded.
    #[arg(long, value_enum, default_value_t = AngleEncoding::Code)]
    pub angle_encoding: AngleEncoding,

    /// Ratings at or above this value count as expert.
    #[arg(long, default_value_t = 4.0)]
    pub expert_threshold: f64,

    /// Restrict the fit to one side of the expert threshold.
    #[arg(long, value_enum, default_value_t = Cohort::All)]
    pub cohort: Cohort,

    /// Only use judgments from this participant id.
    #[arg(long)]
    pub participant: Option<String>,

    /// Starting point for the nonlinear fit.
    #[arg(long, value_enum, default_value_t = GuessMode::LogLinear)]
    pub initial_guess: GuessMode,

    /// Calibration constant r in y = k·x^a·r (held fixed).
    #[arg(long, default_value_t = 1.0)]
    pub r_fixed: f64,

    /// Iteration budget for the optimizer.
    #[arg(long, default_value_t = 800)]
    pub max_iterations: usize,

    /// Samples of each fitted curve kept for display/export.
    #[arg(long, default_value_t = 100)]
    pub curve_points: usize,

    /// Skip the per-angle ASCII plots.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 18)]
    pub height: usize,

    /// Export aggregated points with predictions and residuals to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the full results (per-angle fits + summary) to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

/// Options for the synthetic dataset.
#[derive(Debug, Parser, Clone)]
pub struct SampleArgs {
    /// Output CSV path.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub out: PathBuf,

    /// Number of simulated participants.
    #[arg(short = 'n', long, default_value_t = 12)]
    pub participants: usize,

    /// Physical distances presented at every angle (comma separated).
    #[arg(long, value_delimiter = ',', default_values_t = vec![1.0, 2.0, 4.0, 8.0, 16.0])]
    pub distances: Vec<f64>,

    /// Judgments per participant per angle and distance.
    #[arg(long, default_value_t = 1)]
    pub repeats: usize,

    /// Standard deviation of the multiplicative log-normal noise.
    #[arg(long, default_value_t = 0.15)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// How to write the angle column.
    #[arg(long, value_enum, default_value_t = AngleEncoding::Code)]
    pub angle_encoding: AngleEncoding,
}

/// Options for plotting saved results.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Results JSON file produced by `pdfit fit --export-json`.
    #[arg(long, value_name = "JSON")]
    pub results: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 18)]
    pub height: usize,
}
