//! Read/write results JSON files.
//!
//! Results JSON is the "portable" representation of a run:
//! - the settings it was run with
//! - every angle's outcome (fit + diagnostics + curve sample, or the failure)
//! - the cross-angle summary
//!
//! The schema is defined by `domain::ResultsFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::app::pipeline::RunOutput;
use crate::domain::{FitConfig, ResultsFile, RunSettings};
use crate::error::AppError;

/// Assemble the results file for a finished run.
pub fn results_file(run: &RunOutput, config: &FitConfig) -> ResultsFile {
    ResultsFile {
        tool: "pdfit".to_string(),
        generated_at: Utc::now(),
        settings: RunSettings::from(config),
        groups: run.outcomes.clone(),
        summary: run.summary.clone(),
    }
}

/// Write a results JSON file.
pub fn write_results_json(path: &Path, results: &ResultsFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create results JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, results)
        .map_err(|e| AppError::new(4, format!("Failed to write results JSON: {e}")))?;
    Ok(())
}

/// Read a results JSON file.
pub fn read_results_json(path: &Path) -> Result<ResultsFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open results JSON '{}': {e}", path.display())))?;
    let results: ResultsFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid results JSON: {e}")))?;
    Ok(results)
}
