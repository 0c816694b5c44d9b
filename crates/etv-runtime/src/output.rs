//! CSV renderings of per-household results and the multi-household summary.
//!
//! Floats are written as the shortest single-precision decimal (see
//! [`format_float`]); every line ends in `\n`.

use std::fs;
use std::path::Path;

use etv_core::error::{EtvError, Result};
use etv_core::formatting::{format_float, format_optional_float, quote};
use etv_core::models::ComputationResult;
use tracing::debug;

/// Header line of every per-household results file.
pub const RESULTS_HEADER: &str = r#""house ID","slope energy/HDD","baseload energy","R^2","n","efficiency gain if computed""#;

/// Header line of the multi-household summary file.
pub const SUMMARY_HEADER: &str = r#""households","households with efficiency gain","total days","mean R^2","var R^2","mean slope energy/HDD","var slope energy/HDD","mean efficiency gain","var efficiency gain""#;

// ── Per-household results ─────────────────────────────────────────────────────

/// One results row, without the line terminator.
pub fn result_row(result: &ComputationResult) -> String {
    let m = &result.metrics;
    format!(
        "{},{},{},{},{},{}",
        quote(&result.house_id),
        format_float(m.slope),
        format_float(m.baseline),
        format_float(m.r_squared),
        m.n,
        format_optional_float(result.efficiency_gain)
    )
}

/// Header plus one row per result, in the order given.
pub fn results_to_csv(results: &[ComputationResult]) -> String {
    let mut out = String::with_capacity(RESULTS_HEADER.len() + 1 + results.len() * 64);
    out.push_str(RESULTS_HEADER);
    out.push('\n');
    for r in results {
        out.push_str(&result_row(r));
        out.push('\n');
    }
    out
}

// ── Summary ───────────────────────────────────────────────────────────────────

/// Mean and population variance of one quantity across households.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanAndVariance {
    pub mean: f64,
    pub variance: f64,
}

impl MeanAndVariance {
    /// `NaN` for both when `values` is empty.
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: f64::NAN,
                variance: f64::NAN,
            };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self { mean, variance }
    }
}

/// Aggregate statistics over a group of (segmented) household results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HouseholdGroupSummary {
    pub households: usize,
    pub households_with_gain: usize,
    /// Sum of `n` over all households.
    pub total_days: usize,
    pub r_squared: MeanAndVariance,
    pub slope: MeanAndVariance,
    /// Over households with a computed gain only.
    pub efficiency_gain: MeanAndVariance,
}

impl HouseholdGroupSummary {
    pub fn from_results(results: &[ComputationResult]) -> Self {
        let collect = |f: fn(&ComputationResult) -> f64| results.iter().map(f).collect::<Vec<_>>();
        let gains: Vec<f64> = results.iter().filter_map(|r| r.efficiency_gain).collect();
        Self {
            households: results.len(),
            households_with_gain: gains.len(),
            total_days: results.iter().map(|r| r.metrics.n).sum(),
            r_squared: MeanAndVariance::of(&collect(|r| r.metrics.r_squared)),
            slope: MeanAndVariance::of(&collect(|r| r.metrics.slope)),
            efficiency_gain: MeanAndVariance::of(&gains),
        }
    }

    /// Header plus the single summary row.
    pub fn to_csv(&self) -> String {
        format!(
            "{}\n{},{},{},{},{},{},{},{},{}\n",
            SUMMARY_HEADER,
            self.households,
            self.households_with_gain,
            self.total_days,
            format_float(self.r_squared.mean),
            format_float(self.r_squared.variance),
            format_float(self.slope.mean),
            format_float(self.slope.variance),
            format_float(self.efficiency_gain.mean),
            format_float(self.efficiency_gain.variance),
        )
    }
}

// ── Writing ───────────────────────────────────────────────────────────────────

/// Write `results` to `path`, replacing any existing file.
pub fn write_results_csv(path: &Path, results: &[ComputationResult]) -> Result<()> {
    write_text(path, &results_to_csv(results))?;
    debug!(path = %path.display(), rows = results.len(), "wrote results");
    Ok(())
}

/// Write the summary of `results` to `path`, replacing any existing file.
pub fn write_summary_csv(path: &Path, summary: &HouseholdGroupSummary) -> Result<()> {
    write_text(path, &summary.to_csv())?;
    debug!(path = %path.display(), "wrote summary");
    Ok(())
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|source| EtvError::FileWrite {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
