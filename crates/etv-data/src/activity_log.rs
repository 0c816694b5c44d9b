//! Device activity logs and per-household segmentation.
//!
//! A grouping file maps each household to its devices:
//!
//! ```text
//! # houseID,deviceID...
//! 5013,3015,2d1a
//! ```
//!
//! Each device's log is `<deviceID>.json[.gz]`, one observation per line in
//! either of two forms:
//!
//! ```text
//! ["2016-03-31T05:17:09Z","",{"@":"3015","T|C16":201,"tS|C":2,"v|%":0}]
//! 2016-03-31T05:21:51Z {"@":"3015","tS|C":0}
//! 2016-03-31T05:25:13Z @3015;T19C7
//! ```
//!
//! Stats carrying a setback (`tS|C`) say whether energy saving was active;
//! everything else only shows that the device was alive.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufRead, Read};
use std::path::Path;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use csv::{ReaderBuilder, Trim};
use etv_core::error::{EtvError, Result};
use etv_core::models::{ByHousehold, LocalDay, SavingStatus, SystemStatus};
use etv_core::telemetry::{TelemetryRecord, ID_KEY};
use etv_core::time_utils::{local_day_of, parse_utc_timestamp};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::reader::{find_device_log_files, open_file, open_input, resolve_input};

/// Grouping file name in the input directory.
pub const GROUPING_CSV: &str = "grouping.csv";
/// Stats key of the reporting device's ID.
pub const DEVICE_ID_KEY: &str = "@";
/// Stats key of the temperature setback in °C; non-zero while saving.
pub const SETBACK_KEY: &str = "tS|C";
/// Stats key of the valve position; only radiator valves report it.
pub const VALVE_POSITION_KEY: &str = "v|%";

// ── Grouping ──────────────────────────────────────────────────────────────────

/// Parse `houseID,deviceID[,deviceID...]` lines into devices per household.
///
/// Repeated house lines accumulate their devices. Fields may be quoted;
/// lines starting with `#` are comments.
pub fn parse_grouping(reader: impl Read) -> Result<BTreeMap<String, Vec<String>>> {
    let mut csv = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for result in csv.records() {
        let record = result?;
        let mut fields = record.iter().filter(|f| !f.is_empty());
        let Some(house) = fields.next() else {
            continue;
        };
        let devices: Vec<String> = fields.map(str::to_string).collect();
        if devices.is_empty() {
            return Err(EtvError::MalformedRow {
                line: record.position().map(|p| p.line()).unwrap_or(0),
                reason: format!("house {} has no devices", house),
            });
        }
        groups.entry(house.to_string()).or_default().extend(devices);
    }
    Ok(groups)
}

// ── Log lines ─────────────────────────────────────────────────────────────────

/// One decoded log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogObservation {
    pub utc: DateTime<Utc>,
    /// Device ID the line reports, when it carries one.
    pub device_id: Option<String>,
    /// Setback in °C when the line reports one.
    pub setback_c: Option<f64>,
    pub reports_valve: bool,
    /// Stats object re-serialised, for JSON-form lines.
    pub json_stats: Option<String>,
}

impl LogObservation {
    /// Parse one log line; blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if line.starts_with('[') {
            return Self::from_json_array(line).map(Some);
        }

        let (ts, payload) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| EtvError::MalformedRecord(format!("no payload: {:?}", line)))?;
        let utc = timestamp(ts)?;
        let payload = payload.trim();
        if payload.starts_with('{') {
            let stats = serde_json::from_str::<Map<String, Value>>(payload)?;
            Ok(Some(Self::from_stats(utc, &stats)))
        } else if payload.starts_with(ID_KEY) {
            let record = TelemetryRecord::parse(payload)?;
            Ok(Some(Self {
                utc,
                device_id: Some(record.id().to_string()),
                setback_c: None,
                reports_valve: false,
                json_stats: None,
            }))
        } else {
            Err(EtvError::MalformedRecord(format!("unknown payload: {:?}", payload)))
        }
    }

    fn from_json_array(line: &str) -> Result<Self> {
        let items: Vec<Value> = serde_json::from_str(line)?;
        match items.as_slice() {
            [Value::String(ts), _relay, Value::Object(stats)] => {
                Ok(Self::from_stats(timestamp(ts)?, stats))
            }
            _ => Err(EtvError::MalformedRecord(format!(
                "expected [timestamp, relay, {{stats}}]: {:?}",
                line
            ))),
        }
    }

    fn from_stats(utc: DateTime<Utc>, stats: &Map<String, Value>) -> Self {
        Self {
            utc,
            device_id: stats
                .get(DEVICE_ID_KEY)
                .and_then(Value::as_str)
                .map(str::to_string),
            setback_c: stats.get(SETBACK_KEY).and_then(Value::as_f64),
            reports_valve: stats.contains_key(VALVE_POSITION_KEY),
            json_stats: Some(Value::Object(stats.clone()).to_string()),
        }
    }
}

fn timestamp(ts: &str) -> Result<DateTime<Utc>> {
    parse_utc_timestamp(ts)
        .ok_or_else(|| EtvError::MalformedRecord(format!("bad timestamp {:?}", ts)))
}

// ── Device logs ───────────────────────────────────────────────────────────────

/// What a device said about energy saving on one local day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayMode {
    /// Saving was active at some point.
    Saving,
    /// Mode was reported and saving was never active.
    Normal,
    /// Alive but no mode reported.
    Unknown,
}

impl DayMode {
    fn observe(self, setback_c: Option<f64>) -> Self {
        match (self, setback_c) {
            (mode, None) => mode,
            (_, Some(s)) if s > 0.0 => DayMode::Saving,
            (DayMode::Saving, Some(_)) => DayMode::Saving,
            (_, Some(_)) => DayMode::Normal,
        }
    }
}

/// Digest of one device's log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceLog {
    pub mode_by_day: BTreeMap<LocalDay, DayMode>,
    pub is_valve: bool,
    pub json_stats_by_utc: BTreeMap<i64, String>,
}

impl DeviceLog {
    /// Read the log of `device_id`, assigning observations to local days in
    /// `tz`. Lines reporting a different device ID are skipped.
    pub fn parse(device_id: &str, reader: impl BufRead, tz: Tz) -> Result<Self> {
        let mut log = Self::default();
        let mut misfiled = 0usize;
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let observation = LogObservation::parse(&line).map_err(|e| match e {
                EtvError::MalformedRecord(msg) => {
                    EtvError::MalformedRecord(format!("line {}: {}", index + 1, msg))
                }
                EtvError::JsonParse(e) => {
                    EtvError::MalformedRecord(format!("line {}: {}", index + 1, e))
                }
                other => other,
            })?;
            let Some(observation) = observation else {
                continue;
            };
            match observation.device_id.as_deref() {
                Some(reported) if reported != device_id => {
                    debug!(device_id, reported, line = index + 1, "line from another device");
                    misfiled += 1;
                }
                _ => log.add(observation, tz),
            }
        }
        if misfiled > 0 {
            warn!(device_id, misfiled, "skipped log lines reporting another device ID");
        }
        Ok(log)
    }

    fn add(&mut self, observation: LogObservation, tz: Tz) {
        let day = local_day_of(observation.utc, tz);
        let mode = self.mode_by_day.entry(day).or_insert(DayMode::Unknown);
        *mode = mode.observe(observation.setback_c);
        self.is_valve |= observation.reports_valve;
        if let Some(json) = observation.json_stats {
            self.json_stats_by_utc.insert(observation.utc.timestamp(), json);
        }
    }
}

// ── Segmentation ──────────────────────────────────────────────────────────────

/// Combine device logs into a household's day-by-day status.
///
/// A day is usable only when every device reports a known mode and all agree.
pub fn segment_household(house_id: &str, devices: &BTreeMap<String, DeviceLog>) -> SystemStatus {
    let days: BTreeSet<LocalDay> = devices
        .values()
        .flat_map(|log| log.mode_by_day.keys().copied())
        .collect();

    let status_by_day = days
        .into_iter()
        .map(|day| {
            let mut modes = devices
                .values()
                .map(|log| log.mode_by_day.get(&day).copied().unwrap_or(DayMode::Unknown));
            let status = match modes.next() {
                Some(first) if first != DayMode::Unknown && modes.all(|m| m == first) => {
                    if first == DayMode::Saving {
                        SavingStatus::Enabled
                    } else {
                        SavingStatus::Disabled
                    }
                }
                _ => SavingStatus::DontUse,
            };
            (day, status)
        })
        .collect();

    let mut json_stats_by_utc = BTreeMap::new();
    for log in devices.values() {
        for (utc, json) in &log.json_stats_by_utc {
            json_stats_by_utc.entry(*utc).or_insert_with(|| json.clone());
        }
    }

    SystemStatus {
        house_id: house_id.to_string(),
        status_by_day,
        valve_else_boiler_by_id: devices
            .iter()
            .map(|(id, log)| (id.clone(), log.is_valve))
            .collect(),
        json_stats_by_utc,
    }
}

/// Load the grouping and device logs under `input_dir` and segment each of
/// `house_ids` that appears in the grouping.
///
/// Fails with [`EtvError::NoGroupingData`] when there is no grouping file.
pub fn load_and_segment(
    input_dir: &Path,
    tz: Tz,
    house_ids: &BTreeSet<String>,
) -> Result<ByHousehold<SystemStatus>> {
    if resolve_input(input_dir, GROUPING_CSV).is_none() {
        return Err(EtvError::NoGroupingData(input_dir.join(GROUPING_CSV)));
    }
    let grouping = parse_grouping(open_input(input_dir, GROUPING_CSV)?)?;
    let log_files = find_device_log_files(input_dir);

    let mut by_house = ByHousehold::new();
    for (house_id, device_ids) in grouping {
        if !house_ids.contains(&house_id) {
            continue;
        }
        let mut devices = BTreeMap::new();
        for device_id in device_ids {
            let Some(path) = log_files.get(&device_id) else {
                debug!(house_id, device_id, "no log file for device");
                continue;
            };
            let log = DeviceLog::parse(&device_id, open_file(path)?, tz)?;
            devices.insert(device_id, log);
        }
        if devices.is_empty() {
            warn!(house_id, "no device logs, all days unusable");
        }
        let status = segment_household(&house_id, &devices);
        debug!(
            house_id,
            enabled = status.count(SavingStatus::Enabled),
            disabled = status.count(SavingStatus::Disabled),
            "segmented household"
        );
        by_house.insert(house_id, status);
    }

    info!(households = by_house.len(), "segmented households from device logs");
    Ok(by_house)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
