//! End-to-end computation over one input directory.
//!
//! Stages run in order, each a pure function over immutable collections:
//!
//! 1. gather bulk kWh and HDD into per-household inputs,
//! 2. regress every household (in parallel on the rayon pool),
//! 3. keep results passing [`good_daily_data_results`],
//! 4. segment the survivors from device logs, when a grouping file exists,
//! 5. regress the segmented households and summarise them.
//!
//! Basic outputs are written before segmentation starts, so they survive a
//! later failure.

use std::collections::BTreeSet;
use std::path::Path;

use etv_core::error::{EtvError, Result};
use etv_core::filters::{enough_control_and_normal, good_daily_data_results};
use etv_core::models::{sort_by_house_id, ByHousehold, ComputationInput, ComputationResult, SystemStatus};
use etv_core::regression::RegressionEngine;
use etv_core::settings::PipelineConfig;
use etv_data::activity_log::load_and_segment;
use etv_data::aggregator::gather_from_dir;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::output::{write_results_csv, write_summary_csv, HouseholdGroupSummary};

/// Per-household fits over all joined days.
pub const OUTPUT_FILE_BASIC_STATS: &str = "basicStatsOut.csv";
/// Basic fits that passed the data-quality filter.
pub const OUTPUT_FILE_FILTERED_BASIC_STATS: &str = "basicFilteredStatsOut.csv";
/// Control-period fits with efficiency gain.
pub const OUTPUT_FILE_SEGMENTED_STATS: &str = "segmentedStatsOut.csv";
/// One-row summary of the segmented fits.
pub const OUTPUT_FILE_MULTIHOUSEHOLD_SUMMARY: &str = "multiHouseholdSummaryStatsOut.csv";

// ── Public types ──────────────────────────────────────────────────────────────

/// Segmentation-stage results of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedOutcome {
    pub results: Vec<ComputationResult>,
    pub summary: HouseholdGroupSummary,
}

/// Everything a run computed, in output order.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub basic: Vec<ComputationResult>,
    pub basic_filtered: Vec<ComputationResult>,
    /// `None` when there was no grouping data to segment with.
    pub segmented: Option<SegmentedOutcome>,
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Run the whole pipeline on `config.input_dir`, writing outputs to
/// `config.output_dir`.
///
/// Fails with [`EtvError::NoCandidates`] when filtering or segmentation
/// leaves no households; files written before that point are kept.
pub fn do_computation(config: &PipelineConfig) -> Result<RunOutcome> {
    require_input_dir(&config.input_dir)?;
    require_output_dir(&config.output_dir)?;
    let out = &config.output_dir;

    let inputs = gather_from_dir(config)?;

    let basic = regress_all(inputs.values());
    write_results_csv(&out.join(OUTPUT_FILE_BASIC_STATS), &basic)?;

    let basic_filtered = filter_basic(&basic);
    write_results_csv(&out.join(OUTPUT_FILE_FILTERED_BASIC_STATS), &basic_filtered)?;
    info!(
        households = basic.len(),
        kept = basic_filtered.len(),
        "basic statistics written"
    );
    if basic_filtered.is_empty() {
        return Err(EtvError::NoCandidates("filtering".to_string()));
    }

    let stage1_ids: BTreeSet<String> = basic_filtered.iter().map(|r| r.house_id.clone()).collect();
    let statuses = match load_and_segment(&config.input_dir, config.timezone, &stage1_ids) {
        Ok(statuses) => statuses,
        Err(e) if e.is_skip_signal() => {
            info!("{}; segmentation not attempted", e);
            return Ok(RunOutcome {
                basic,
                basic_filtered,
                segmented: None,
            });
        }
        Err(e) => return Err(e),
    };

    let segmented_inputs = segment_stage(&inputs, &statuses);
    if segmented_inputs.is_empty() {
        return Err(EtvError::NoCandidates("segmentation".to_string()));
    }

    let results = regress_all(segmented_inputs.iter());
    let summary = HouseholdGroupSummary::from_results(&results);
    write_results_csv(&out.join(OUTPUT_FILE_SEGMENTED_STATS), &results)?;
    write_summary_csv(&out.join(OUTPUT_FILE_MULTIHOUSEHOLD_SUMMARY), &summary)?;
    info!(
        households = summary.households,
        with_gain = summary.households_with_gain,
        "segmented statistics written"
    );

    Ok(RunOutcome {
        basic,
        basic_filtered,
        segmented: Some(SegmentedOutcome { results, summary }),
    })
}

// ── Stages ────────────────────────────────────────────────────────────────────

/// Compute every input in parallel; results sorted by house ID.
pub fn regress_all<'a>(inputs: impl Iterator<Item = &'a ComputationInput>) -> Vec<ComputationResult> {
    let inputs: Vec<&ComputationInput> = inputs.collect();
    let mut results: Vec<ComputationResult> = inputs
        .par_iter()
        .map(|input| RegressionEngine::compute(input))
        .collect();
    sort_by_house_id(&mut results);
    results
}

/// Results passing the basic quality filter, keeping their order.
pub fn filter_basic(results: &[ComputationResult]) -> Vec<ComputationResult> {
    results
        .iter()
        .filter(|r| good_daily_data_results(r))
        .cloned()
        .collect()
}

/// Segmented inputs for households with enough control and normal days.
pub fn segment_stage(
    inputs: &ByHousehold<ComputationInput>,
    statuses: &ByHousehold<SystemStatus>,
) -> Vec<ComputationInput> {
    statuses
        .iter()
        .filter_map(|(house_id, status)| {
            let input = inputs.get(house_id)?;
            if enough_control_and_normal(status, input) {
                Some(input.with_status(status))
            } else {
                debug!(house_id, "too few control or normal days");
                None
            }
        })
        .collect()
}

fn require_input_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    Err(EtvError::FileRead {
        path: dir.to_path_buf(),
        source: not_a_directory(),
    })
}

fn require_output_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    Err(EtvError::FileWrite {
        path: dir.to_path_buf(),
        source: not_a_directory(),
    })
}

fn not_a_directory() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Tz;
    use etv_core::models::{DailySeries, HddMetrics, LocalDay, SavingStatus};
    use std::collections::BTreeMap;

    fn linear_input(id: &str, days: i32) -> ComputationInput {
        let hdd: DailySeries = (0..days).map(|d| (LocalDay(d), (d % 7) as f64 + 1.0)).collect();
        let kwh: DailySeries = hdd.iter().map(|(d, h)| (*d, 2.0 * h + 1.0)).collect();
        ComputationInput::new(id, Tz::UTC, kwh, hdd)
    }

    fn status(id: &str, control: std::ops::Range<i32>, normal: std::ops::Range<i32>) -> SystemStatus {
        let mut by_day = BTreeMap::new();
        by_day.extend(control.map(|d| (LocalDay(d), SavingStatus::Enabled)));
        by_day.extend(normal.map(|d| (LocalDay(d), SavingStatus::Disabled)));
        SystemStatus {
            house_id: id.to_string(),
            status_by_day: by_day,
            valve_else_boiler_by_id: BTreeMap::new(),
            json_stats_by_utc: BTreeMap::new(),
        }
    }

    #[test]
    fn test_regress_all_sorted_numerically() {
        let inputs = [linear_input("10", 20), linear_input("9", 20), linear_input("abc", 20)];
        let results = regress_all(inputs.iter());
        let ids: Vec<&str> = results.iter().map(|r| r.house_id.as_str()).collect();
        assert_eq!(ids, vec!["9", "10", "abc"]);
        assert!(results.iter().all(|r| r.metrics.n == 20));
    }

    #[test]
    fn test_filter_basic_drops_short_series() {
        let results = regress_all([linear_input("1", 20), linear_input("2", 5)].iter());
        let kept = filter_basic(&results);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].house_id, "1");
    }

    #[test]
    fn test_segment_stage_needs_enough_days() {
        let inputs = ByHousehold::from([
            ("1".to_string(), linear_input("1", 20)),
            ("2".to_string(), linear_input("2", 20)),
        ]);
        let statuses = ByHousehold::from([
            ("1".to_string(), status("1", 0..5, 5..10)),
            ("2".to_string(), status("2", 0..5, 5..7)),
            ("3".to_string(), status("3", 0..5, 5..10)),
        ]);
        let segmented = segment_stage(&inputs, &statuses);
        assert_eq!(segmented.len(), 1);
        assert_eq!(segmented[0].house_id, "1");
        assert!(segmented[0].status_by_day.is_some());
    }

    #[test]
    fn test_require_dirs() {
        let absent = Path::new("/tmp/does-not-exist-etv-xyz");
        assert!(matches!(require_input_dir(absent), Err(EtvError::FileRead { .. })));
        assert!(matches!(require_output_dir(absent), Err(EtvError::FileWrite { .. })));
        assert!(require_input_dir(&std::env::temp_dir()).is_ok());
        assert!(require_output_dir(&std::env::temp_dir()).is_ok());
    }

    #[test]
    fn test_segmented_metrics_come_from_control_days() {
        let input = linear_input("1", 20).with_status(&status("1", 0..7, 7..14));
        let results = regress_all(std::iter::once(&input));
        let HddMetrics { n, .. } = results[0].metrics;
        assert_eq!(n, 7);
        assert_eq!(results[0].efficiency_gain.map(|g| (g * 1e6).round()), Some(1e6));
    }
}
