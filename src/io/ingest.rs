//! CSV ingest and normalization.
//!
//! This module turns an experiment export into a clean set of
//! `(angle, physical, perceived, rating)` observations.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip unparsable rows, but report what happened)
//! - **No domain judgement**: non-positive distances are passed through; the
//!   core rejects them per angle so one bad value cannot sink other angles
//! - **Separation of concerns**: no fitting logic here

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{info, warn};

use crate::domain::{Angle, AngleCodes, AngleEncoding, Cohort, FitConfig, Observation};
use crate::error::AppError;

const COL_ANGLE: &str = "angle";
const COL_PHYSICAL: &str = "physical_distance";
const COL_PERCEIVED: &str = "perceived_distance";
const COLS_RATING: [&str; 2] = ["ratings", "rating"];
const COLS_PARTICIPANT: [&str; 3] = ["participantid", "participant_id", "participant"];

/// How to interpret and filter the input rows.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub angle_encoding: AngleEncoding,
    pub angle_codes: AngleCodes,
    pub cohort: Cohort,
    pub expert_threshold: f64,
    pub participant: Option<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            angle_encoding: AngleEncoding::Code,
            angle_codes: AngleCodes::default(),
            cohort: Cohort::All,
            expert_threshold: 4.0,
            participant: None,
        }
    }
}

impl From<&FitConfig> for IngestOptions {
    fn from(config: &FitConfig) -> Self {
        Self {
            angle_encoding: config.angle_encoding,
            angle_codes: config.angle_codes.clone(),
            cohort: config.cohort,
            expert_threshold: config.expert_threshold,
            participant: config.participant.clone(),
        }
    }
}

/// Summary stats about the observations actually used.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub n_observations: usize,
    pub n_angles: usize,
    pub n_participants: usize,
    pub physical_min: f64,
    pub physical_max: f64,
    pub perceived_min: f64,
    pub perceived_max: f64,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: observations + stats + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub observations: Vec<Observation>,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load observations from a CSV file.
pub fn load_observations(path: &Path, opts: &IngestOptions) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let data = read_observations(file, opts)?;
    info!(
        path = %path.display(),
        rows_read = data.rows_read,
        rows_used = data.rows_used,
        row_errors = data.row_errors.len(),
        "observations loaded"
    );
    Ok(data)
}

/// Read observations from any CSV source.
pub fn read_observations<R: Read>(source: R, opts: &IngestOptions) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let columns = Columns::resolve(&headers, opts)?;

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: header is line 1, records are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                let message = format!("CSV parse error: {e}");
                warn!(line, "skipping row: {message}");
                row_errors.push(RowError { line, message });
                continue;
            }
        };

        match parse_row(&record, &columns, opts) {
            Ok(obs) => {
                if admits(&obs, opts) {
                    observations.push(obs);
                }
            }
            Err(message) => {
                warn!(line, "skipping row: {message}");
                row_errors.push(RowError { line, message });
            }
        }
    }

    let rows_used = observations.len();
    let stats = compute_stats(&observations).ok_or_else(|| {
        AppError::new(3, "No valid rows remain after parsing/filtering.")
    })?;

    Ok(IngestedData {
        observations,
        stats,
        row_errors,
        rows_read,
        rows_used,
    })
}

/// Resolved column indices.
struct Columns {
    angle: usize,
    physical: usize,
    perceived: usize,
    rating: Option<usize>,
    participant: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord, opts: &IngestOptions) -> Result<Self, AppError> {
        let map = build_header_map(headers);
        let required = |name: &str| {
            map.get(name)
                .copied()
                .ok_or_else(|| AppError::new(2, format!("Missing required column: `{name}`")))
        };
        let optional = |names: &[&str]| names.iter().find_map(|n| map.get(*n).copied());

        let columns = Self {
            angle: required(COL_ANGLE)?,
            physical: required(COL_PHYSICAL)?,
            perceived: required(COL_PERCEIVED)?,
            rating: optional(&COLS_RATING[..]),
            participant: optional(&COLS_PARTICIPANT[..]),
        };

        // Filters that need optional columns are validated early for clearer errors.
        if opts.cohort != Cohort::All && columns.rating.is_none() {
            return Err(AppError::new(
                2,
                "Filter `--cohort` requires a `Ratings` column in the CSV.",
            ));
        }
        if opts.participant.is_some() && columns.participant.is_none() {
            return Err(AppError::new(
                2,
                "Filter `--participant` requires a `ParticipantID` column in the CSV.",
            ));
        }
        Ok(columns)
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

/// `"Physical Distance"`, `"physical-distance"` and `"physical_distance"` all
/// resolve to `physical_distance`.
fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

fn parse_row(record: &StringRecord, columns: &Columns, opts: &IngestOptions) -> Result<Observation, String> {
    let angle = parse_angle(get_required(record, columns.angle, COL_ANGLE)?, opts)?;
    let physical = parse_f64(get_required(record, columns.physical, COL_PHYSICAL)?, COL_PHYSICAL)?;
    let perceived = parse_f64(get_required(record, columns.perceived, COL_PERCEIVED)?, COL_PERCEIVED)?;
    let rating = match columns.rating.and_then(|idx| get_optional(record, idx)) {
        Some(s) => parse_f64(s, "ratings")?,
        None => 0.0,
    };
    let participant = columns
        .participant
        .and_then(|idx| get_optional(record, idx))
        .map(str::to_string);

    Ok(Observation {
        angle,
        physical,
        perceived,
        rating,
        participant,
    })
}

fn parse_angle(s: &str, opts: &IngestOptions) -> Result<Angle, String> {
    let v = parse_f64(s, COL_ANGLE)?;
    if v.fract() != 0.0 || v < 0.0 {
        return Err(format!("Invalid angle '{s}': expected a non-negative whole number."));
    }
    match opts.angle_encoding {
        AngleEncoding::Code => opts
            .angle_codes
            .angle(v as u32)
            .ok_or_else(|| format!("Unknown angle code '{s}'.")),
        AngleEncoding::Degrees => {
            let deg = u16::try_from(v as u64).ok().and_then(Angle::from_degrees);
            deg.ok_or_else(|| format!("Invalid angle '{s}': degrees must be in 0..360."))
        }
    }
}

fn admits(obs: &Observation, opts: &IngestOptions) -> bool {
    if !opts.cohort.admits(obs, opts.expert_threshold) {
        return false;
    }
    match (&opts.participant, &obs.participant) {
        (None, _) => true,
        (Some(want), Some(have)) => want.trim() == have.trim(),
        (Some(_), None) => false,
    }
}

fn compute_stats(observations: &[Observation]) -> Option<DatasetStats> {
    if observations.is_empty() {
        return None;
    }
    let mut physical_min = f64::INFINITY;
    let mut physical_max = f64::NEG_INFINITY;
    let mut perceived_min = f64::INFINITY;
    let mut perceived_max = f64::NEG_INFINITY;
    let mut angles = BTreeSet::new();
    let mut participants = BTreeSet::new();

    for o in observations {
        physical_min = physical_min.min(o.physical);
        physical_max = physical_max.max(o.physical);
        perceived_min = perceived_min.min(o.perceived);
        perceived_max = perceived_max.max(o.perceived);
        angles.insert(o.angle);
        if let Some(p) = &o.participant {
            participants.insert(p.as_str());
        }
    }

    Some(DatasetStats {
        n_observations: observations.len(),
        n_angles: angles.len(),
        n_participants: participants.len(),
        physical_min,
        physical_max,
        perceived_min,
        perceived_max,
    })
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    get_optional(record, idx).ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_f64(s: &str, name: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("Invalid number for `{name}`: '{s}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\u{feff}ParticipantID,Angle,Physical Distance,Perceived Distance,Ratings\n\
        3,1,1.0,1.2,5\n\
        3,2,2.0,1.8,2\n\
        6,2,2.0,2.2,4\n\
        6,9,2.0,2.2,4\n\
        6,3,abc,2.2,4\n\
        22,8,4.0,0,1\n";

    #[test]
    fn reads_spreadsheet_export_headers() {
        let data = read_observations(CSV.as_bytes(), &IngestOptions::default()).unwrap();
        assert_eq!(data.rows_read, 6);
        assert_eq!(data.rows_used, 4);
        assert_eq!(data.row_errors.len(), 2);
        assert_eq!(data.row_errors[0].line, 5);
        assert!(data.row_errors[0].message.contains("Unknown angle code"));
        assert_eq!(data.observations[0].angle.degrees(), 0);
        assert_eq!(data.observations[1].angle.degrees(), 45);
        assert_eq!(data.observations[3].angle.degrees(), 315);
        assert_eq!(data.observations[0].participant.as_deref(), Some("3"));
        assert_eq!(data.stats.n_angles, 3);
        assert_eq!(data.stats.n_participants, 3);
    }

    #[test]
    fn non_positive_values_pass_through_ingest() {
        let data = read_observations(CSV.as_bytes(), &IngestOptions::default()).unwrap();
        assert_eq!(data.observations[3].perceived, 0.0);
        assert_eq!(data.stats.perceived_min, 0.0);
    }

    #[test]
    fn cohort_and_participant_filters() {
        let opts = IngestOptions {
            cohort: Cohort::Expert,
            ..IngestOptions::default()
        };
        let data = read_observations(CSV.as_bytes(), &opts).unwrap();
        assert_eq!(data.rows_used, 2);
        assert!(data.observations.iter().all(|o| o.rating >= 4.0));

        let opts = IngestOptions {
            participant: Some("6".to_string()),
            ..IngestOptions::default()
        };
        let data = read_observations(CSV.as_bytes(), &opts).unwrap();
        assert_eq!(data.rows_used, 1);
    }

    #[test]
    fn degrees_encoding() {
        let csv = "angle,physical_distance,perceived_distance\n90,1,1\n360,1,1\n45.5,1,1\n";
        let opts = IngestOptions {
            angle_encoding: AngleEncoding::Degrees,
            ..IngestOptions::default()
        };
        let data = read_observations(csv.as_bytes(), &opts).unwrap();
        assert_eq!(data.rows_used, 1);
        assert_eq!(data.observations[0].angle.degrees(), 90);
        assert_eq!(data.observations[0].rating, 0.0);
        assert_eq!(data.row_errors.len(), 2);
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let csv = "angle,perceived_distance\n1,1\n";
        let err = read_observations(csv.as_bytes(), &IngestOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("physical_distance"));
    }

    #[test]
    fn cohort_filter_needs_ratings_column() {
        let csv = "angle,physical_distance,perceived_distance\n1,1,1\n";
        let opts = IngestOptions {
            cohort: Cohort::NonExpert,
            ..IngestOptions::default()
        };
        assert_eq!(read_observations(csv.as_bytes(), &opts).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn no_rows_is_no_data() {
        let csv = "angle,physical_distance,perceived_distance\n";
        let err = read_observations(csv.as_bytes(), &IngestOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn header_normalization() {
        assert_eq!(normalize_header_name(" Physical  Distance "), "physical_distance");
        assert_eq!(normalize_header_name("perceived-distance"), "perceived_distance");
        assert_eq!(normalize_header_name("\u{feff}ParticipantID"), "participantid");
    }

    #[test]
    fn undecodable_record_is_a_row_error() {
        let mut bytes = b"Angle,Physical Distance,Perceived Distance\n1,1,1\n".to_vec();
        bytes.extend_from_slice(b"2,2,\xff\xfe\n");
        bytes.extend_from_slice(b"3,4,3.5\n");
        let data = read_observations(bytes.as_slice(), &IngestOptions::default()).unwrap();
        assert_eq!(data.rows_read, 3);
        assert_eq!(data.rows_used, 2);
        assert_eq!(data.row_errors.len(), 1);
        assert_eq!(data.row_errors[0].line, 3);
        assert!(data.row_errors[0].message.starts_with("CSV parse error"));
    }
}
