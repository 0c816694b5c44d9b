use chrono::{DateTime, Days, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

// ── LocalDay ──────────────────────────────────────────────────────────────────

/// A calendar day in some household's local time zone, as days since
/// 1970-01-01.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalDay(pub i32);

fn epoch() -> NaiveDate {
    DateTime::UNIX_EPOCH.date_naive()
}

impl LocalDay {
    /// Day index for a local calendar date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self((date - epoch()).num_days() as i32)
    }

    /// Calendar date for this day index.
    pub fn to_date(self) -> NaiveDate {
        if self.0 >= 0 {
            epoch() + Days::new(self.0 as u64)
        } else {
            epoch() - Days::new(self.0.unsigned_abs() as u64)
        }
    }
}

impl fmt::Display for LocalDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_date().format("%Y-%m-%d"))
    }
}

/// Ordered day-indexed readings (kWh or HDD). Missing days are absent keys.
pub type DailySeries = BTreeMap<LocalDay, f64>;

// ── SavingStatus / SystemStatus ───────────────────────────────────────────────

/// Per-day operating regime of a household's heating controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavingStatus {
    /// Energy-saving features active all day (control period).
    Enabled,
    /// Energy-saving features inactive all day (normal period).
    Disabled,
    /// Missing, partial or inconsistent data; excluded from comparisons.
    DontUse,
}

/// Segmentation output for one household.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub house_id: String,
    /// Per-day classification; days absent here count as [`SavingStatus::DontUse`].
    pub status_by_day: BTreeMap<LocalDay, SavingStatus>,
    /// Per-device flag: `true` for a radiator valve, `false` for a boiler control.
    pub valve_else_boiler_by_id: BTreeMap<String, bool>,
    /// Raw JSON stats lines keyed by UTC epoch seconds.
    pub json_stats_by_utc: BTreeMap<i64, String>,
}

fn status_in(statuses: &BTreeMap<LocalDay, SavingStatus>, day: LocalDay) -> SavingStatus {
    statuses.get(&day).copied().unwrap_or(SavingStatus::DontUse)
}

impl SystemStatus {
    /// Status for `day`, treating absent days as unusable.
    pub fn status_on(&self, day: LocalDay) -> SavingStatus {
        status_in(&self.status_by_day, day)
    }

    /// Number of days classified as `status`.
    pub fn count(&self, status: SavingStatus) -> usize {
        self.status_by_day.values().filter(|s| **s == status).count()
    }
}

// ── ComputationInput ──────────────────────────────────────────────────────────

/// Everything needed to compute one household's statistics.
///
/// `kwh_by_day` and `hdd_by_day` must use the same time-zone convention for
/// their day indices; this is not checked.
#[derive(Debug, Clone)]
pub struct ComputationInput {
    pub house_id: String,
    pub timezone: Tz,
    pub kwh_by_day: DailySeries,
    pub hdd_by_day: DailySeries,
    pub status_by_day: Option<BTreeMap<LocalDay, SavingStatus>>,
    pub json_stats_by_utc: Option<BTreeMap<i64, String>>,
    pub valve_else_boiler_by_id: Option<BTreeMap<String, bool>>,
}

impl ComputationInput {
    /// Basic input with no segmentation data.
    pub fn new(
        house_id: impl Into<String>,
        timezone: Tz,
        kwh_by_day: DailySeries,
        hdd_by_day: DailySeries,
    ) -> Self {
        Self {
            house_id: house_id.into(),
            timezone,
            kwh_by_day,
            hdd_by_day,
            status_by_day: None,
            json_stats_by_utc: None,
            valve_else_boiler_by_id: None,
        }
    }

    /// Copy of this input carrying the segmentation from `status`.
    pub fn with_status(&self, status: &SystemStatus) -> Self {
        Self {
            status_by_day: Some(status.status_by_day.clone()),
            json_stats_by_utc: Some(status.json_stats_by_utc.clone()),
            valve_else_boiler_by_id: Some(status.valve_else_boiler_by_id.clone()),
            ..self.clone()
        }
    }

    /// Segmentation status for `day`; `DontUse` when unsegmented or absent.
    pub fn status_on(&self, day: LocalDay) -> SavingStatus {
        self.status_by_day
            .as_ref()
            .map_or(SavingStatus::DontUse, |statuses| status_in(statuses, day))
    }

    /// Days present in both the energy and HDD series.
    pub fn joined_days(&self) -> impl Iterator<Item = LocalDay> + '_ {
        self.kwh_by_day
            .keys()
            .filter(|day| self.hdd_by_day.contains_key(day))
            .copied()
    }
}

// ── ComputationResult ─────────────────────────────────────────────────────────

/// Fit of daily energy against HDD for one set of days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HddMetrics {
    /// Energy per unit HDD (kWh/HDD); NaN when no fit was possible.
    pub slope: f64,
    /// Energy at zero HDD (baseload kWh/day); NaN when no fit was possible.
    pub baseline: f64,
    /// Coefficient of determination in `[0, 1]`; NaN when undefined.
    pub r_squared: f64,
    /// Number of days with both energy and HDD data.
    pub n: usize,
}

impl HddMetrics {
    /// Result for a set of days that cannot be fitted.
    pub fn degenerate(n: usize) -> Self {
        Self {
            slope: f64::NAN,
            baseline: f64::NAN,
            r_squared: f64::NAN,
            n,
        }
    }

    /// Whether both coefficients are finite.
    pub fn is_fitted(&self) -> bool {
        self.slope.is_finite() && self.baseline.is_finite()
    }
}

/// Per-household output of the regression engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationResult {
    pub house_id: String,
    pub metrics: HddMetrics,
    /// kWh/HDD with saving disabled over kWh/HDD with saving enabled.
    pub efficiency_gain: Option<f64>,
}

// ── Ordering ──────────────────────────────────────────────────────────────────

/// Deterministic house-ID order: numeric when both IDs are integers,
/// otherwise lexicographic (numbers sort before non-numbers).
pub fn compare_house_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Sort results in place by house ID with [`compare_house_ids`].
pub fn sort_by_house_id(results: &mut [ComputationResult]) {
    results.sort_by(|a, b| compare_house_ids(&a.house_id, &b.house_id));
}

/// Per-household collections keyed by house ID.
pub type ByHousehold<T> = BTreeMap<String, T>;

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str) -> ComputationResult {
        ComputationResult {
            house_id: id.to_string(),
            metrics: HddMetrics::degenerate(0),
            efficiency_gain: None,
        }
    }

    // ── LocalDay ──────────────────────────────────────────────────────────────

    #[test]
    fn test_local_day_epoch_is_zero() {
        let d = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(LocalDay::from_date(d), LocalDay(0));
    }

    #[test]
    fn test_local_day_round_trips_date() {
        let d = NaiveDate::from_ymd_opt(2016, 3, 1).unwrap();
        let day = LocalDay::from_date(d);
        assert_eq!(day.0, 16861);
        assert_eq!(day.to_date(), d);
        assert_eq!(day.to_string(), "2016-03-01");
    }

    #[test]
    fn test_local_day_before_epoch() {
        let d = NaiveDate::from_ymd_opt(1969, 12, 31).unwrap();
        assert_eq!(LocalDay::from_date(d), LocalDay(-1));
        assert_eq!(LocalDay(-1).to_date(), d);
    }

    // ── SystemStatus ──────────────────────────────────────────────────────────

    #[test]
    fn test_status_absent_day_is_dont_use() {
        let mut status = SystemStatus {
            house_id: "1".to_string(),
            status_by_day: BTreeMap::new(),
            valve_else_boiler_by_id: BTreeMap::new(),
            json_stats_by_utc: BTreeMap::new(),
        };
        status
            .status_by_day
            .insert(LocalDay(1), SavingStatus::Enabled);
        assert_eq!(status.status_on(LocalDay(1)), SavingStatus::Enabled);
        assert_eq!(status.status_on(LocalDay(2)), SavingStatus::DontUse);
        assert_eq!(status.count(SavingStatus::Enabled), 1);
        assert_eq!(status.count(SavingStatus::Disabled), 0);
    }

    // ── ComputationInput ──────────────────────────────────────────────────────

    #[test]
    fn test_joined_days_is_inner_join() {
        let kwh: DailySeries = [(LocalDay(1), 1.0), (LocalDay(2), 2.0), (LocalDay(4), 4.0)]
            .into_iter()
            .collect();
        let hdd: DailySeries = [(LocalDay(2), 5.0), (LocalDay(3), 6.0), (LocalDay(4), 7.0)]
            .into_iter()
            .collect();
        let input = ComputationInput::new("1", Tz::UTC, kwh, hdd);
        let days: Vec<LocalDay> = input.joined_days().collect();
        assert_eq!(days, vec![LocalDay(2), LocalDay(4)]);
    }

    #[test]
    fn test_input_status_on_matches_segmentation() {
        let input = ComputationInput::new("1", Tz::UTC, DailySeries::new(), DailySeries::new());
        assert_eq!(input.status_on(LocalDay(1)), SavingStatus::DontUse);

        let status = SystemStatus {
            house_id: "1".to_string(),
            status_by_day: BTreeMap::from([(LocalDay(1), SavingStatus::Disabled)]),
            valve_else_boiler_by_id: BTreeMap::new(),
            json_stats_by_utc: BTreeMap::new(),
        };
        let segmented = input.with_status(&status);
        assert_eq!(segmented.status_on(LocalDay(1)), SavingStatus::Disabled);
        assert_eq!(segmented.status_on(LocalDay(2)), SavingStatus::DontUse);
    }

    // ── Ordering ──────────────────────────────────────────────────────────────

    #[test]
    fn test_sort_numeric_ids_numerically() {
        let mut rs = vec![result("5013"), result("998"), result("10001")];
        sort_by_house_id(&mut rs);
        let ids: Vec<&str> = rs.iter().map(|r| r.house_id.as_str()).collect();
        assert_eq!(ids, vec!["998", "5013", "10001"]);
    }

    #[test]
    fn test_sort_mixed_ids_numbers_first() {
        let mut rs = vec![result("b"), result("12"), result("a"), result("3")];
        sort_by_house_id(&mut rs);
        let ids: Vec<&str> = rs.iter().map(|r| r.house_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "12", "a", "b"]);
    }

    #[test]
    fn test_sort_is_total_for_equal_numeric_values() {
        assert_eq!(compare_house_ids("007", "7"), Ordering::Less);
        assert_eq!(compare_house_ids("7", "7"), Ordering::Equal);
    }
}
