//! Heating-degree-day CSV as exported by degreedays.net.
//!
//! ```text
//! Description:,"Celsius-based heating degree days for a base temperature of 15.5C"
//! Source:,"www.degreedays.net (using temperature data from www.wunderground.com)"
//! ...
//! Date,HDD,% Estimated
//! 2016-03-01,9.8,0
//! 2016-03-02,10.4,2
//! ```
//!
//! Everything before the line starting with `Date` is preamble. Multi-base
//! exports name their columns `HDD 15.5C`, `HDD 18C` and so on.

use std::collections::BTreeMap;
use std::io::{BufRead, Cursor, Read};
use std::sync::OnceLock;

use csv::{ReaderBuilder, StringRecord, Trim};
use etv_core::error::{EtvError, Result};
use etv_core::models::{DailySeries, LocalDay};
use etv_core::time_utils::parse_local_date;
use regex::Regex;
use tracing::{debug, warn};

/// Largest difference (°C) tolerated between requested and stated bases.
pub const BASELINE_TOLERANCE_C: f64 = 0.05;

const DATE_COLUMN: &str = "Date";
const PLAIN_HDD_COLUMN: &str = "HDD";
const ESTIMATED_COLUMN: &str = "% Estimated";

fn preamble_base_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"base temperature of (-?\d+(?:\.\d+)?)\s*C").expect("regex is valid")
    })
}

fn column_base_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^HDD\s+(-?\d+(?:\.\d+)?)\s*C$").expect("regex is valid"))
}

/// Parsed HDD series for one base temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct HddData {
    pub baseline_c: f64,
    pub by_day: DailySeries,
    /// Percentage of each day's value that the provider estimated.
    pub percent_estimated: BTreeMap<LocalDay, f64>,
}

// ── HddExtractor ──────────────────────────────────────────────────────────────

/// Extracts a daily HDD series at a fixed base temperature.
#[derive(Debug, Clone, Copy)]
pub struct HddExtractor {
    baseline_c: f64,
}

impl HddExtractor {
    pub fn new(baseline_c: f64) -> Self {
        Self { baseline_c }
    }

    /// Parse a whole export.
    pub fn extract(&self, mut reader: impl BufRead) -> Result<HddData> {
        let header = self.skip_preamble(&mut reader)?;
        let mut csv = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(Cursor::new(header).chain(reader));
        let headers = csv.headers()?.clone();
        let hdd_col = self.hdd_column(&headers)?;
        let est_col = headers.iter().position(|h| h == ESTIMATED_COLUMN);

        let mut data = HddData {
            baseline_c: self.baseline_c,
            by_day: DailySeries::new(),
            percent_estimated: BTreeMap::new(),
        };
        for result in csv.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let date = record.get(0).unwrap_or("");
            if date.is_empty() {
                continue;
            }
            let day = parse_local_date(date).ok_or_else(|| EtvError::MalformedRow {
                line,
                reason: format!("bad date {:?}", date),
            })?;
            let hdd = parse_number(record.get(hdd_col), line, "HDD")?;
            if data.by_day.insert(day, hdd).is_some() {
                return Err(EtvError::DuplicateDay {
                    context: "HDD data".to_string(),
                    day: day.to_string(),
                });
            }
            if let Some(col) = est_col {
                let raw = record.get(col).unwrap_or("").trim_end_matches('%');
                if !raw.is_empty() {
                    data.percent_estimated
                        .insert(day, parse_number(Some(raw), line, ESTIMATED_COLUMN)?);
                }
            }
        }

        let estimated = data.percent_estimated.values().filter(|p| **p > 0.0).count();
        debug!(
            days = data.by_day.len(),
            estimated,
            baseline_c = self.baseline_c,
            "parsed HDD data"
        );
        Ok(data)
    }

    // ── Private ───────────────────────────────────────────────────────────────

    /// Consume preamble lines and return the header line.
    fn skip_preamble(&self, reader: &mut impl BufRead) -> Result<String> {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(EtvError::MissingColumn(DATE_COLUMN.to_string()));
            }
            let trimmed = line.trim_start_matches('\u{feff}').trim_start();
            if trimmed.starts_with(DATE_COLUMN) {
                return Ok(trimmed.to_string());
            }
            if let Some(caps) = preamble_base_re().captures(trimmed) {
                if let Ok(found) = caps[1].parse::<f64>() {
                    self.check_baseline(found)?;
                }
            }
        }
    }

    fn check_baseline(&self, found: f64) -> Result<()> {
        if (found - self.baseline_c).abs() > BASELINE_TOLERANCE_C {
            warn!(expected = self.baseline_c, found, "HDD base temperature mismatch");
            return Err(EtvError::BaselineMismatch {
                expected: self.baseline_c,
                found,
            });
        }
        Ok(())
    }

    fn hdd_column(&self, headers: &StringRecord) -> Result<usize> {
        if let Some(i) = headers.iter().position(|h| h == PLAIN_HDD_COLUMN) {
            return Ok(i);
        }
        headers
            .iter()
            .position(|h| {
                column_base_re()
                    .captures(h)
                    .and_then(|c| c[1].parse::<f64>().ok())
                    .is_some_and(|base| (base - self.baseline_c).abs() <= BASELINE_TOLERANCE_C)
            })
            .ok_or_else(|| EtvError::MissingColumn(format!("HDD {}C", self.baseline_c)))
    }
}

/// Convenience wrapper: extract the series at `baseline_c`.
pub fn extract_simple_hdd(reader: impl BufRead, baseline_c: f64) -> Result<HddData> {
    HddExtractor::new(baseline_c).extract(reader)
}

fn parse_number(field: Option<&str>, line: u64, what: &str) -> Result<f64> {
    let raw = field.unwrap_or("").trim();
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EtvError::MalformedRow {
            line,
            reason: format!("bad {} value {:?}", what, raw),
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
