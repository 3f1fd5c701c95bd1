//! ASCII panels, one per angle, for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (golden tests)
//!
//! Plot elements:
//! - fitted curve: `-`
//! - 1:1 reference line (perceived = physical): `:`
//! - raw judgments: `E` (expert), `.` (non-expert)
//! - geometric mean per distance: `@`

use crate::domain::{GroupFit, GroupOutcome, GroupStatus, ObservationGroup, ResultsFile};
use crate::fit::sample_curve;

const LEGEND: &str = "@ geometric mean  - fit  : 1:1  E expert  . non-expert";

/// Render one angle's panel. `group` adds the raw judgments when available.
pub fn render_group_panel(
    outcome: &GroupOutcome,
    group: Option<&ObservationGroup>,
    expert_threshold: f64,
    width: usize,
    height: usize,
) -> String {
    match &outcome.status {
        GroupStatus::Fitted(fit) => render_fit(outcome, fit, group, expert_threshold, width, height),
        GroupStatus::Failed(failure) => format!(
            "Angle {}: not fitted ({}: {})\n",
            outcome.angle,
            failure.kind.label(),
            failure.message
        ),
    }
}

/// Render every angle of a saved results file (no raw judgments).
pub fn render_results(results: &ResultsFile, width: usize, height: usize) -> String {
    let mut out = String::new();
    for outcome in &results.groups {
        out.push_str(&render_group_panel(outcome, None, 0.0, width, height));
        out.push('\n');
    }
    out
}

fn render_fit(
    outcome: &GroupOutcome,
    fit: &GroupFit,
    group: Option<&ObservationGroup>,
    expert_threshold: f64,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let raw: Vec<(f64, f64, bool)> = group
        .map(|g| {
            g.observations
                .iter()
                .map(|o| (o.physical, o.perceived, o.is_expert(expert_threshold)))
                .collect()
        })
        .unwrap_or_default();

    let (x_min, x_max) = x_range(fit, &raw).unwrap_or((0.0, 1.0));
    let curve: Vec<(f64, f64)> = if fit.curve.x.len() >= 2 {
        fit.curve.x.iter().copied().zip(fit.curve.y.iter().copied()).collect()
    } else {
        let sampled = sample_curve(&fit.model, x_min, x_max, width);
        sampled.x.into_iter().zip(sampled.y).collect()
    };
    let identity = [(x_min, x_min), (x_max, x_max)];

    let ys = raw
        .iter()
        .map(|&(_, y, _)| y)
        .chain(fit.points.iter().map(|p| p.representative))
        .chain(curve.iter().map(|&(_, y)| y))
        .chain([x_min, x_max]);
    let (y_min, y_max) = finite_bounds(ys).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let frame = Frame {
        x_min,
        x_max,
        y_min,
        y_max,
        width,
        height,
    };
    let mut grid = vec![vec![' '; width]; height];

    // Curve first, then the reference line into the remaining blanks; markers overlay both.
    draw_polyline(&mut grid, &frame, &curve, '-');
    draw_polyline(&mut grid, &frame, &identity, ':');

    for &(x, y, expert) in &raw {
        if let Some((col, row)) = frame.cell(x, y) {
            grid[row][col] = if expert { 'E' } else { '.' };
        }
    }
    for p in &fit.points {
        if let Some((col, row)) = frame.cell(p.physical, p.representative) {
            grid[row][col] = '@';
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Angle {} | k={:.3} a={:.3} R²={:.3} | x=[{x_min:.2}, {x_max:.2}] y=[{y_min:.2}, {y_max:.2}]\n",
        outcome.angle, fit.model.k, fit.model.a, fit.diagnostics.r_squared
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out.push_str(LEGEND);
    out.push('\n');

    out
}

/// Plot area in data and cell coordinates.
struct Frame {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    width: usize,
    height: usize,
}

impl Frame {
    /// Cell for a data point; `None` for non-finite values.
    fn cell(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        if !(x.is_finite() && y.is_finite()) {
            return None;
        }
        let u = ((x - self.x_min) / (self.x_max - self.x_min)).clamp(0.0, 1.0);
        let v = ((y - self.y_min) / (self.y_max - self.y_min)).clamp(0.0, 1.0);
        let col = (u * (self.width as f64 - 1.0)).round() as usize;
        // Row 0 is the top (y_max).
        let row = (self.height as f64 - 1.0 - v * (self.height as f64 - 1.0)).round() as usize;
        Some((col, row))
    }
}

fn x_range(fit: &GroupFit, raw: &[(f64, f64, bool)]) -> Option<(f64, f64)> {
    let xs = raw
        .iter()
        .map(|&(x, _, _)| x)
        .chain(fit.points.iter().map(|p| p.physical));
    let (x0, x1) = finite_bounds(xs)?;
    if x1 - x0 < 1e-9 {
        // One distinct distance (e.g. a hand-edited results file).
        return Some(((x0 - 0.5).max(0.0), x1 + 0.5));
    }
    Some((x0, x1))
}

/// Smallest and largest finite value; equal when only one value is present.
fn finite_bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    (lo <= hi).then_some((lo, hi))
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = if span > 1e-12 { span * frac } else { 0.5 };
    (min - pad, max + pad)
}

fn draw_polyline(grid: &mut [Vec<char>], frame: &Frame, points: &[(f64, f64)], ch: char) {
    let mut prev = None;
    for &(x, y) in points {
        let Some(cell) = frame.cell(x, y) else {
            prev = None;
            continue;
        };
        match prev {
            Some(start) => draw_line(grid, start, cell, ch),
            None => draw_line(grid, cell, cell, ch),
        }
        prev = Some(cell);
    }
}

/// Integer line drawing (Bresenham-ish). Only fills blank cells.
fn draw_line(grid: &mut [Vec<char>], from: (usize, usize), to: (usize, usize), ch: char) {
    let (mut x0, mut y0) = (from.0 as isize, from.1 as isize);
    let (x1, y1) = (to.0 as isize, to.1 as isize);

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AggregatedPoint, Angle, CurveSample, FitDiagnostics, FittedModel, GroupFailure, Observation,
    };
    use crate::error::ErrorKind;

    fn outcome() -> GroupOutcome {
        GroupOutcome {
            angle: Angle::from_degrees(45).unwrap(),
            n_observations: 2,
            n_expert: 1,
            status: GroupStatus::Fitted(GroupFit {
                points: vec![
                    AggregatedPoint { physical: 1.0, representative: 1.0, count: 1 },
                    AggregatedPoint { physical: 4.0, representative: 4.0, count: 1 },
                ],
                model: FittedModel {
                    k: 1.0,
                    a: 1.0,
                    r: 1.0,
                    covariance: [[0.0; 3]; 3],
                    iterations: 0,
                },
                diagnostics: FitDiagnostics {
                    r_squared: 1.0,
                    rmse: 0.0,
                    log_residuals: vec![0.0, 0.0],
                    log_rms: 0.0,
                },
                curve: CurveSample {
                    x: vec![1.0, 4.0],
                    y: vec![1.0, 4.0],
                },
            }),
        }
    }

    #[test]
    fn plot_golden_snapshot_small() {
        let txt = render_group_panel(&outcome(), None, 4.0, 10, 5);
        let expected = concat!(
            "Angle 45° | k=1.000 a=1.000 R²=1.000 | x=[1.00, 4.00] y=[0.85, 4.15]\n",
            "        -@\n",
            "      --  \n",
            "    --    \n",
            "  --      \n",
            "@-        \n",
            "@ geometric mean  - fit  : 1:1  E expert  . non-expert\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn raw_judgments_are_marked_by_expertise() {
        let group = ObservationGroup {
            angle: Angle::from_degrees(45).unwrap(),
            observations: vec![
                Observation {
                    angle: Angle::from_degrees(45).unwrap(),
                    physical: 2.0,
                    perceived: 3.5,
                    rating: 5.0,
                    participant: None,
                },
                Observation {
                    angle: Angle::from_degrees(45).unwrap(),
                    physical: 3.0,
                    perceived: 1.2,
                    rating: 1.0,
                    participant: None,
                },
            ],
        };
        let txt = render_group_panel(&outcome(), Some(&group), 4.0, 30, 12);
        assert!(txt.contains('E'));
        assert!(txt.contains('.'));
        assert!(txt.contains('@'));
    }

    #[test]
    fn failed_angle_renders_reason() {
        let failed = GroupOutcome {
            angle: Angle::from_degrees(180).unwrap(),
            n_observations: 3,
            n_expert: 0,
            status: GroupStatus::Failed(GroupFailure {
                kind: ErrorKind::InvalidObservation,
                message: "invalid observation: zero".to_string(),
            }),
        };
        let txt = render_group_panel(&failed, None, 4.0, 20, 8);
        assert_eq!(txt, "Angle 180°: not fitted (InvalidObservation: invalid observation: zero)\n");
    }

    #[test]
    fn single_distance_widens_the_x_axis() {
        let mut single = outcome();
        if let GroupStatus::Fitted(fit) = &mut single.status {
            fit.points.truncate(1);
            fit.curve = CurveSample::default();
        }
        let txt = render_group_panel(&single, None, 4.0, 20, 6);
        let header = txt.lines().next().unwrap();
        assert!(header.contains("x=[0.50, 1.50]"), "{header}");
        assert_eq!(txt.matches('@').count(), 2);
    }
}
