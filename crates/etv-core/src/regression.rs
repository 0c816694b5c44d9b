//! Ordinary least-squares fit of daily energy against heating degree days.

use crate::models::{ComputationInput, ComputationResult, HddMetrics, SavingStatus};

/// Fewest joined days for which a fit is attempted.
pub const MIN_FIT_DAYS: usize = 2;

/// Fewest days in each of the control and normal subsets for an efficiency
/// gain to be computed.
pub const MIN_SEGMENT_FIT_DAYS: usize = 3;

// ── Fitting ───────────────────────────────────────────────────────────────────

/// Fit `kwh = slope * hdd + baseline` over `(hdd, kwh)` pairs.
///
/// Uses population (not sample-corrected) moments. Returns
/// [`HddMetrics::degenerate`] when there are fewer than [`MIN_FIT_DAYS`]
/// pairs or all HDD values are equal.
pub fn fit(pairs: &[(f64, f64)]) -> HddMetrics {
    let n = pairs.len();
    if n < MIN_FIT_DAYS {
        return HddMetrics::degenerate(n);
    }

    let nf = n as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / nf;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / nf;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    let var_x = sxx / nf;
    if var_x == 0.0 {
        return HddMetrics::degenerate(n);
    }
    let slope = (sxy / nf) / var_x;
    let baseline = mean_y - slope * mean_x;

    let ss_res: f64 = pairs
        .iter()
        .map(|(x, y)| {
            let e = y - (slope * x + baseline);
            e * e
        })
        .sum();
    let r_squared = if syy == 0.0 {
        f64::NAN
    } else {
        (1.0 - ss_res / syy).clamp(0.0, 1.0)
    };

    HddMetrics {
        slope,
        baseline,
        r_squared,
        n,
    }
}

// ── RegressionEngine ──────────────────────────────────────────────────────────

/// Stateless per-household computation.
pub struct RegressionEngine;

impl RegressionEngine {
    /// Joined `(hdd, kwh)` pairs in day order, optionally restricted to days
    /// with the given status.
    pub fn joined_pairs(input: &ComputationInput, only: Option<SavingStatus>) -> Vec<(f64, f64)> {
        input
            .kwh_by_day
            .iter()
            .filter(|(day, _)| match only {
                None => true,
                Some(wanted) => input.status_on(**day) == wanted,
            })
            .filter_map(|(day, kwh)| input.hdd_by_day.get(day).map(|hdd| (*hdd, *kwh)))
            .collect()
    }

    /// Fit over all joined days, or only those with status `only`.
    pub fn hdd_metrics(input: &ComputationInput, only: Option<SavingStatus>) -> HddMetrics {
        fit(&Self::joined_pairs(input, only))
    }

    /// Compute the household result.
    ///
    /// Without segmentation the fit covers every joined day and no gain is
    /// reported. With segmentation the headline fit covers the control
    /// (saving-enabled) days and the gain compares the normal and control
    /// fits via [`efficiency_gain`].
    pub fn compute(input: &ComputationInput) -> ComputationResult {
        if input.status_by_day.is_none() {
            return ComputationResult {
                house_id: input.house_id.clone(),
                metrics: Self::hdd_metrics(input, None),
                efficiency_gain: None,
            };
        }

        let control = Self::hdd_metrics(input, Some(SavingStatus::Enabled));
        let normal = Self::hdd_metrics(input, Some(SavingStatus::Disabled));
        tracing::debug!(
            house_id = %input.house_id,
            control_n = control.n,
            normal_n = normal.n,
            "segmented fits"
        );

        ComputationResult {
            house_id: input.house_id.clone(),
            metrics: control,
            efficiency_gain: efficiency_gain(&control, &normal),
        }
    }
}

/// Ratio of normal to control kWh/HDD.
///
/// Equivalent to the ratio of the two fits' predicted heating energy above
/// baseload at any reference HDD; values above 1 indicate a saving. `None`
/// unless both fits have at least [`MIN_SEGMENT_FIT_DAYS`] days and positive
/// finite slopes.
pub fn efficiency_gain(control: &HddMetrics, normal: &HddMetrics) -> Option<f64> {
    let usable = |m: &HddMetrics| m.n >= MIN_SEGMENT_FIT_DAYS && m.slope.is_finite() && m.slope > 0.0;
    if !usable(control) || !usable(normal) {
        return None;
    }
    Some(normal.slope / control.slope)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
