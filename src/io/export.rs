//! CSV exports.
//!
//! - aggregated points with fitted values and residuals, one row per
//!   (angle, physical distance), for spreadsheets or downstream scripts
//! - raw observations in the experiment's own column layout (used by the
//!   synthetic sampler)

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{AngleCodes, AngleEncoding, GroupOutcome, Observation};
use crate::error::AppError;
use crate::report::point_rows;

/// Write per-point results for every fitted angle.
pub fn write_points_csv(path: &Path, outcomes: &[GroupOutcome]) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writeln!(
        file,
        "angle_deg,physical_distance,geometric_mean,count,predicted,residual,log_residual"
    )
    .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for outcome in outcomes {
        for row in point_rows(outcome) {
            writeln!(
                file,
                "{},{:.10},{:.10},{},{:.10},{:.10},{:.10}",
                row.angle.degrees(),
                row.physical,
                row.representative,
                row.count,
                row.predicted,
                row.residual,
                row.log_residual,
            )
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
        }
    }

    Ok(())
}

/// Write raw observations with the headers the ingest side expects.
pub fn write_observations_csv(
    path: &Path,
    observations: &[Observation],
    encoding: AngleEncoding,
    codes: &AngleCodes,
) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create CSV '{}': {e}", path.display())))?;

    writer
        .write_record(["ParticipantID", "Angle", "Physical Distance", "Perceived Distance", "Ratings"])
        .map_err(|e| AppError::new(2, format!("Failed to write CSV header: {e}")))?;

    for obs in observations {
        let angle = match encoding {
            AngleEncoding::Degrees => obs.angle.degrees().to_string(),
            AngleEncoding::Code => codes
                .code(obs.angle)
                .ok_or_else(|| AppError::new(4, format!("No angle code for {}.", obs.angle)))?
                .to_string(),
        };
        writer
            .write_record([
                obs.participant.clone().unwrap_or_default(),
                angle,
                format!("{:.6}", obs.physical),
                format!("{:.6}", obs.perceived),
                format!("{}", obs.rating),
            ])
            .map_err(|e| AppError::new(2, format!("Failed to write CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CSV '{}': {e}", path.display())))?;
    Ok(())
}
