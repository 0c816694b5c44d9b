//! Quality gates applied between pipeline stages.
//!
//! Both predicates are pure: they only decide whether an item is kept.

use crate::models::{ComputationInput, ComputationResult, SavingStatus, SystemStatus};

/// Fewest joined days for a basic result to be kept.
pub const MIN_DAYS: usize = 14;
/// Smallest acceptable R^2 for a basic result.
pub const MIN_R2: f64 = 0.1;
/// Largest plausible kWh per HDD for a single household.
pub const MAX_SLOPE_KWH_PER_HDD: f64 = 100.0;
/// Largest plausible magnitude of daily baseload kWh.
pub const MAX_ABS_BASELINE_KWH: f64 = 100.0;
/// Fewest usable control days, and separately normal days, for segmentation.
pub const MIN_CONTROL_AND_NORMAL_DAYS: usize = 3;

/// Keep results with enough days, an acceptable fit and plausible coefficients.
pub fn good_daily_data_results(result: &ComputationResult) -> bool {
    let m = &result.metrics;
    m.n >= MIN_DAYS
        && m.is_fitted()
        && m.r_squared.is_finite()
        && m.r_squared >= MIN_R2
        && m.slope > 0.0
        && m.slope <= MAX_SLOPE_KWH_PER_HDD
        && m.baseline.abs() <= MAX_ABS_BASELINE_KWH
}

/// Keep households with enough control and normal days that also have both
/// energy and HDD data.
pub fn enough_control_and_normal(status: &SystemStatus, input: &ComputationInput) -> bool {
    let (control, normal) = usable_day_counts(status, input);
    control >= MIN_CONTROL_AND_NORMAL_DAYS && normal >= MIN_CONTROL_AND_NORMAL_DAYS
}

/// `(control, normal)` counts over days present in both input series.
pub fn usable_day_counts(status: &SystemStatus, input: &ComputationInput) -> (usize, usize) {
    input
        .joined_days()
        .fold((0, 0), |(c, n), day| match status.status_on(day) {
            SavingStatus::Enabled => (c + 1, n),
            SavingStatus::Disabled => (c, n + 1),
            SavingStatus::DontUse => (c, n),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DailySeries, HddMetrics, LocalDay};
    use chrono_tz::Tz;
    use std::collections::BTreeMap;

    fn result(slope: f64, baseline: f64, r_squared: f64, n: usize) -> ComputationResult {
        ComputationResult {
            house_id: "1".to_string(),
            metrics: HddMetrics { slope, baseline, r_squared, n },
            efficiency_gain: None,
        }
    }

    fn input(days: i32) -> ComputationInput {
        let s: DailySeries = (0..days).map(|d| (LocalDay(d), 1.0)).collect();
        ComputationInput::new("1", Tz::UTC, s.clone(), s)
    }

    fn status(days: &[(i32, SavingStatus)]) -> SystemStatus {
        SystemStatus {
            house_id: "1".to_string(),
            status_by_day: days.iter().map(|(d, s)| (LocalDay(*d), *s)).collect(),
            valve_else_boiler_by_id: BTreeMap::new(),
            json_stats_by_utc: BTreeMap::new(),
        }
    }

    // ── good_daily_data_results ───────────────────────────────────────────────

    #[test]
    fn test_good_result_kept() {
        assert!(good_daily_data_results(&result(1.55, 1.3, 0.63, 156)));
    }

    #[test]
    fn test_too_few_days_rejected() {
        assert!(!good_daily_data_results(&result(1.55, 1.3, 0.63, MIN_DAYS - 1)));
        assert!(good_daily_data_results(&result(1.55, 1.3, 0.63, MIN_DAYS)));
    }

    #[test]
    fn test_poor_fit_rejected() {
        assert!(!good_daily_data_results(&result(1.55, 1.3, 0.05, 100)));
    }

    #[test]
    fn test_implausible_coefficients_rejected() {
        assert!(!good_daily_data_results(&result(-0.5, 1.3, 0.63, 100)));
        assert!(!good_daily_data_results(&result(0.0, 1.3, 0.63, 100)));
        assert!(!good_daily_data_results(&result(250.0, 1.3, 0.63, 100)));
        assert!(!good_daily_data_results(&result(1.5, -400.0, 0.63, 100)));
    }

    #[test]
    fn test_degenerate_rejected() {
        let r = ComputationResult {
            house_id: "1".to_string(),
            metrics: HddMetrics::degenerate(0),
            efficiency_gain: None,
        };
        assert!(!good_daily_data_results(&r));
    }

    #[test]
    fn test_filter_is_idempotent() {
        let all = vec![
            result(1.55, 1.3, 0.63, 156),
            result(1.55, 1.3, 0.01, 156),
            result(2.0, 0.5, 0.8, 3),
            result(0.9, 2.0, 0.4, 40),
        ];
        let once: Vec<ComputationResult> =
            all.iter().filter(|r| good_daily_data_results(r)).cloned().collect();
        let twice: Vec<ComputationResult> =
            once.iter().filter(|r| good_daily_data_results(r)).cloned().collect();
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    // ── enough_control_and_normal ─────────────────────────────────────────────

    #[test]
    fn test_enough_control_and_normal() {
        use SavingStatus::*;
        let s = status(&[(0, Enabled), (1, Enabled), (2, Enabled), (3, Disabled), (4, Disabled), (5, Disabled)]);
        assert!(enough_control_and_normal(&s, &input(6)));
    }

    #[test]
    fn test_too_few_normal_days() {
        use SavingStatus::*;
        let s = status(&[(0, Enabled), (1, Enabled), (2, Enabled), (3, Disabled), (4, DontUse)]);
        assert!(!enough_control_and_normal(&s, &input(6)));
    }

    #[test]
    fn test_days_without_energy_do_not_count() {
        use SavingStatus::*;
        let s = status(&[(0, Enabled), (1, Enabled), (2, Enabled), (3, Disabled), (4, Disabled), (9, Disabled)]);
        assert_eq!(usable_day_counts(&s, &input(6)), (3, 2));
        assert!(!enough_control_and_normal(&s, &input(6)));
    }

    #[test]
    fn test_empty_status_rejected() {
        assert!(!enough_control_and_normal(&status(&[]), &input(30)));
    }
}
