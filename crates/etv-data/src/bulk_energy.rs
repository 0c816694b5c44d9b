//! "N-format" bulk household energy CSV.
//!
//! ```text
//! house_id,received_timestamp,device_timestamp,energy,temperature
//! 5013,1456790520,1456790400,14.2,-3
//! ```
//!
//! Each row is one household's kWh for the local day containing
//! `device_timestamp` (UTC epoch seconds; `received_timestamp` is used when the
//! device time is blank). Columns are located by header name.

use std::io::Read;

use chrono_tz::Tz;
use csv::{ReaderBuilder, StringRecord, Trim};
use etv_core::error::{EtvError, Result};
use etv_core::models::{ByHousehold, DailySeries, LocalDay};
use etv_core::time_utils::{local_day_of_epoch_seconds, DEFAULT_TIMEZONE};
use serde::Deserialize;
use tracing::debug;

/// Columns that must be present in the header.
const REQUIRED_COLUMNS: &[&str] = &["house_id", "device_timestamp", "energy"];

#[derive(Debug, Deserialize)]
struct NBulkRow {
    house_id: String,
    #[serde(default)]
    received_timestamp: Option<i64>,
    device_timestamp: Option<i64>,
    energy: f64,
}

/// One decoded row: house, local day, kWh.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyReading {
    pub house_id: String,
    pub day: LocalDay,
    pub kwh: f64,
}

// ── NBulkKwhParser ────────────────────────────────────────────────────────────

/// Decodes N-format bulk energy data into per-house daily kWh.
#[derive(Debug, Clone, Copy)]
pub struct NBulkKwhParser {
    timezone: Tz,
}

impl Default for NBulkKwhParser {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

impl NBulkKwhParser {
    /// Parser assigning readings to days in `timezone`.
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }


    /// Daily kWh for one household.
    ///
    /// Fails with [`EtvError::DuplicateDay`] if two of its rows fall on the
    /// same local day.
    pub fn kwh_by_local_day(&self, reader: impl Read, house_id: &str) -> Result<DailySeries> {
        let mut series = DailySeries::new();
        self.for_each_reading(reader, |r| {
            if r.house_id == house_id {
                insert_unique(&mut series, &r)?;
            }
            Ok(())
        })?;
        debug!(house_id, days = series.len(), "parsed bulk kWh");
        Ok(series)
    }

    /// Daily kWh for every household in a single pass.
    pub fn kwh_by_house(&self, reader: impl Read) -> Result<ByHousehold<DailySeries>> {
        let mut by_house = ByHousehold::<DailySeries>::new();
        self.for_each_reading(reader, |r| {
            let series = by_house.entry(r.house_id.clone()).or_default();
            insert_unique(series, &r)
        })?;
        debug!(households = by_house.len(), "parsed bulk kWh for all households");
        Ok(by_house)
    }

    // ── Private ───────────────────────────────────────────────────────────────

    fn for_each_reading(
        &self,
        reader: impl Read,
        mut f: impl FnMut(DailyReading) -> Result<()>,
    ) -> Result<()> {
        let mut csv = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(false)
            .from_reader(reader);
        let headers = csv.headers()?.clone();
        check_headers(&headers)?;

        for result in csv.records() {
            let record = result.map_err(malformed_row)?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let row: NBulkRow = record.deserialize(Some(&headers)).map_err(malformed_row)?;
            f(self.to_reading(row, line)?)?;
        }
        Ok(())
    }

    fn to_reading(&self, row: NBulkRow, line: u64) -> Result<DailyReading> {
        let bad = |reason: &str| EtvError::MalformedRow {
            line,
            reason: format!("house {}: {}", row.house_id, reason),
        };
        if row.house_id.is_empty() {
            return Err(bad("empty house_id"));
        }
        if !row.energy.is_finite() {
            return Err(bad("non-finite energy"));
        }
        let ts = row
            .device_timestamp
            .or(row.received_timestamp)
            .ok_or_else(|| bad("no timestamp"))?;
        let day = local_day_of_epoch_seconds(ts, self.timezone)
            .ok_or_else(|| bad("timestamp out of range"))?;
        Ok(DailyReading {
            house_id: row.house_id,
            day,
            kwh: row.energy,
        })
    }
}

fn check_headers(headers: &StringRecord) -> Result<()> {
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == *column) {
            return Err(EtvError::MissingColumn(column.to_string()));
        }
    }
    Ok(())
}

fn insert_unique(series: &mut DailySeries, reading: &DailyReading) -> Result<()> {
    if series.insert(reading.day, reading.kwh).is_some() {
        return Err(EtvError::DuplicateDay {
            context: format!("house {}", reading.house_id),
            day: reading.day.to_string(),
        });
    }
    Ok(())
}

fn malformed_row(e: csv::Error) -> EtvError {
    EtvError::MalformedRow {
        line: e.position().map(|p| p.line()).unwrap_or(0),
        reason: e.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
