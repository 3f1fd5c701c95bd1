//! Formatted terminal output.
//!
//! Formatting lives in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::RunOutput;
use crate::domain::{CorpusSummary, Distribution, FitConfig, GroupOutcome, GroupStatus};
use crate::io::ingest::IngestedData;

/// Dataset stats and run settings.
pub fn format_run_summary(ingest: &IngestedData, config: &FitConfig) -> String {
    let mut out = String::new();
    let stats = &ingest.stats;

    out.push_str("=== pdfit - Perceived Distance Power-Law Fit ===\n");
    out.push_str(&format!("Data: {}\n", config.data_path.display()));
    out.push_str(&format!(
        "Rows: read={} used={} errors={}\n",
        ingest.rows_read,
        ingest.rows_used,
        ingest.row_errors.len()
    ));
    out.push_str(&format!(
        "Observations: n={} | angles={} | participants={}\n",
        stats.n_observations, stats.n_angles, stats.n_participants
    ));
    out.push_str(&format!(
        "Physical=[{:.2}, {:.2}] | perceived=[{:.2}, {:.2}]\n",
        stats.physical_min, stats.physical_max, stats.perceived_min, stats.perceived_max
    ));
    out.push_str(&format!(
        "Cohort: {:?} (expert: rating >= {}) | model: y = k * x^a * r (r fixed at {})\n",
        config.cohort, config.expert_threshold, config.r_fixed
    ));
    for err in ingest.row_errors.iter().take(10) {
        out.push_str(&format!("  (row {}) {}\n", err.line, err.message));
    }
    if ingest.row_errors.len() > 10 {
        out.push_str(&format!("  ... {} more row errors\n", ingest.row_errors.len() - 10));
    }
    out.push('\n');

    out
}

/// One line per angle: parameters and fit quality, or the failure.
pub fn format_group_table(outcomes: &[GroupOutcome]) -> String {
    let mut out = String::new();

    out.push_str(
        format!(
            "{:>6} {:>6} {:>6} {:>9} {:>9} {:>9} {:>9} {:>8} {:>8}",
            "angle", "n", "expert", "k", "a", "k*r", "R2", "rmse", "log_rms"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<6} {:-<6} {:-<6} {:-<9} {:-<9} {:-<9} {:-<9} {:-<8} {:-<8}",
            "", "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for o in outcomes {
        let line = match &o.status {
            GroupStatus::Fitted(fit) => format!(
                "{:>6} {:>6} {:>6} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>8.4} {:>8.4}",
                o.angle.to_string(),
                o.n_observations,
                o.n_expert,
                fit.model.k,
                fit.model.a,
                fit.model.effective_scale(),
                fit.diagnostics.r_squared,
                fit.diagnostics.rmse,
                fit.diagnostics.log_rms,
            ),
            GroupStatus::Failed(failure) => format!(
                "{:>6} {:>6} {:>6} {} ({})",
                o.angle.to_string(),
                o.n_observations,
                o.n_expert,
                failure.kind.label(),
                failure.message,
            ),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

/// Cross-angle distributions plus every failed angle.
pub fn format_corpus_summary(summary: &CorpusSummary) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Summary over {} of {} angle(s):\n",
        summary.groups_fitted, summary.groups_total
    ));
    out.push_str(&format_distribution("R²", summary.r_squared));
    out.push_str(&format_distribution("a", summary.exponent));
    out.push_str(&format_distribution("k", summary.scale));
    out.push_str(&format_distribution("k*r", summary.effective_scale));
    match summary.log_residuals {
        Some(res) => out.push_str(&format!(
            "- log residuals: n={} mean={:.4} rms={:.4}\n",
            res.n, res.mean, res.rms
        )),
        None => out.push_str("- log residuals: undefined (no fitted angles)\n"),
    }

    if !summary.failures.is_empty() {
        out.push_str("Not fitted:\n");
        for f in &summary.failures {
            out.push_str(&format!("- {}: {} ({})\n", f.angle, f.kind.label(), f.message));
        }
    }

    out
}

/// Everything `pdfit fit` prints before plots.
pub fn format_run(ingest: &IngestedData, run: &RunOutput, config: &FitConfig) -> String {
    let mut out = format_run_summary(ingest, config);
    out.push_str(&format_group_table(&run.outcomes));
    out.push('\n');
    out.push_str(&format_corpus_summary(&run.summary));
    out
}

fn format_distribution(label: &str, dist: Option<Distribution>) -> String {
    match dist {
        Some(d) => format!("- {label:<4} mean={:.4} std={:.4} (n={})\n", d.mean, d.std_dev, d.n),
        None => format!("- {label:<4} undefined (no fitted angles)\n"),
    }
}
