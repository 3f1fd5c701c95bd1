//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs the per-angle fit pipeline
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, FitArgs, PlotArgs, SampleArgs};
use crate::data::{SampleConfig, generate_sample};
use crate::domain::{AngleCodes, FitConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `pdfit` binary.
pub fn run() -> Result<(), AppError> {
    // Optional: a local .env may carry PDFIT_DATA / RUST_LOG.
    dotenvy::dotenv().ok();
    init_logging();

    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Sample(args) => handle_sample(args),
        Command::Plot(args) => handle_plot(args),
    }
}

/// Logs go to stderr so stdout stays a clean report.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    let (ingest, run) = pipeline::run_fit(&config)?;

    println!("{}", crate::report::format_run(&ingest, &run, &config));

    if config.plot {
        for outcome in &run.outcomes {
            let panel = crate::plot::render_group_panel(
                outcome,
                run.group(outcome),
                config.expert_threshold,
                config.plot_width,
                config.plot_height,
            );
            println!("{panel}");
        }
    }

    // Optional exports.
    if let Some(path) = &config.export_points {
        crate::io::export::write_points_csv(path, &run.outcomes)?;
        info!(path = %path.display(), "wrote points CSV");
    }
    if let Some(path) = &config.export_json {
        let results = crate::io::results::results_file(&run, &config);
        crate::io::results::write_results_json(path, &results)?;
        info!(path = %path.display(), "wrote results JSON");
    }

    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let codes = AngleCodes::default();
    let config = SampleConfig {
        participants: args.participants,
        distances: args.distances,
        repeats: args.repeats,
        noise_sigma: args.noise,
        seed: args.seed,
    };
    let sample = generate_sample(&config, &codes)?;
    crate::io::export::write_observations_csv(&args.out, &sample.observations, args.angle_encoding, &codes)?;

    println!(
        "Wrote {} judgments to {}",
        sample.observations.len(),
        args.out.display()
    );
    println!("{:>8} {:>8} {:>8}", "angle", "k", "a");
    for t in &sample.truth {
        println!("{:>8} {:>8.4} {:>8.4}", t.angle.to_string(), t.k, t.a);
    }
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let results = crate::io::results::read_results_json(&args.results)?;
    let plot = crate::plot::render_results(&results, args.width, args.height);
    println!("{plot}");
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    if !(args.r_fixed.is_finite() && args.r_fixed > 0.0) {
        return Err(AppError::new(2, "--r-fixed must be finite and > 0."));
    }
    if args.max_iterations == 0 {
        return Err(AppError::new(2, "--max-iterations must be >= 1."));
    }
    if !args.expert_threshold.is_finite() {
        return Err(AppError::new(2, "--expert-threshold must be finite."));
    }

    Ok(FitConfig {
        data_path: args.data.clone(),
        angle_encoding: args.angle_encoding,
        angle_codes: AngleCodes::default(),
        expert_threshold: args.expert_threshold,
        cohort: args.cohort,
        participant: args.participant.clone(),
        guess: args.initial_guess,
        r_fixed: args.r_fixed,
        max_iterations: args.max_iterations,
        curve_points: args.curve_points,
        plot: !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export_points: args.export.clone(),
        export_json: args.export_json.clone(),
    })
}
