//! Joins bulk energy and HDD data into per-household computation inputs.

use std::io::{BufRead, Read};

use chrono_tz::Tz;
use etv_core::error::Result;
use etv_core::models::{ByHousehold, ComputationInput};
use etv_core::settings::PipelineConfig;
use tracing::info;

use crate::bulk_energy::NBulkKwhParser;
use crate::hdd::extract_simple_hdd;
use crate::reader::open_input;

/// HDD input file name.
pub const INPUT_FILE_HDD: &str = "HDD.csv";
/// N-format bulk kWh input file name.
pub const INPUT_FILE_NKWH: &str = "NkWh.csv";

/// Input for a single household.
pub fn gather_data(
    house_id: &str,
    nbulk: impl Read,
    hdd: impl BufRead,
    tz: Tz,
    hdd_baseline_c: f64,
) -> Result<ComputationInput> {
    let kwh_by_day = NBulkKwhParser::new(tz).kwh_by_local_day(nbulk, house_id)?;
    let hdd = extract_simple_hdd(hdd, hdd_baseline_c)?;
    Ok(ComputationInput::new(house_id, tz, kwh_by_day, hdd.by_day))
}

/// Inputs for every household in the bulk data, sharing one HDD series.
pub fn gather_data_for_all_households(
    nbulk: impl Read,
    hdd: impl BufRead,
    tz: Tz,
    hdd_baseline_c: f64,
) -> Result<ByHousehold<ComputationInput>> {
    let hdd = extract_simple_hdd(hdd, hdd_baseline_c)?;
    let by_house = NBulkKwhParser::new(tz).kwh_by_house(nbulk)?;
    Ok(by_house
        .into_iter()
        .map(|(house_id, kwh)| {
            let input = ComputationInput::new(house_id.clone(), tz, kwh, hdd.by_day.clone());
            (house_id, input)
        })
        .collect())
}

/// Read `HDD.csv` and `NkWh.csv` (plain or `.gz`) from `config.input_dir`.
pub fn gather_from_dir(config: &PipelineConfig) -> Result<ByHousehold<ComputationInput>> {
    let input_dir = &config.input_dir;
    let inputs = gather_data_for_all_households(
        open_input(input_dir, INPUT_FILE_NKWH)?,
        open_input(input_dir, INPUT_FILE_HDD)?,
        config.timezone,
        config.hdd_baseline_c,
    )?;
    info!(
        households = inputs.len(),
        dir = %input_dir.display(),
        "gathered household inputs"
    );
    Ok(inputs)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use etv_core::error::EtvError;
    use tempfile::TempDir;

    const HDD: &str = "Date,HDD,% Estimated\n2016-03-01,10,0\n2016-03-02,8,0\n2016-03-03,6,0\n";
    // Midday UTC on 2016-03-01 .. 03.
    const NKWH: &str = "house_id,received_timestamp,device_timestamp,energy,temperature\n\
5013,1456833600,1456833600,21,5\n\
5013,1456920000,1456920000,17,5\n\
1002,1456833600,1456833600,30,5\n\
1002,1457006400,1457006400,20,5\n";

    #[test]
    fn test_gather_data_single_house() {
        let input = gather_data("5013", NKWH.as_bytes(), HDD.as_bytes(), Tz::UTC, 15.5).unwrap();
        assert_eq!(input.house_id, "5013");
        assert_eq!(input.kwh_by_day.len(), 2);
        assert_eq!(input.hdd_by_day.len(), 3);
        assert_eq!(input.joined_days().count(), 2);
        assert!(input.status_by_day.is_none());
    }

    #[test]
    fn test_gather_all_households() {
        let all =
            gather_data_for_all_households(NKWH.as_bytes(), HDD.as_bytes(), Tz::UTC, 15.5).unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["1002", "5013"]);
        assert_eq!(all["1002"].joined_days().count(), 2);
        assert_eq!(all["1002"].timezone, Tz::UTC);
    }

    #[test]
    fn test_gather_from_dir() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        std::fs::write(input.path().join(INPUT_FILE_HDD), HDD).unwrap();
        std::fs::write(input.path().join(INPUT_FILE_NKWH), NKWH).unwrap();
        let config = PipelineConfig::new(input.path(), output.path());
        let all = gather_from_dir(&config).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_gather_from_dir_missing_input() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(INPUT_FILE_HDD), HDD).unwrap();
        let config = PipelineConfig::new(dir.path(), dir.path());
        let err = gather_from_dir(&config).unwrap_err();
        assert!(matches!(err, EtvError::FileRead { .. }));
    }
}
