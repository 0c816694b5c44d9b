//! Compact `@` key/value telemetry records.
//!
//! A record such as `@D49;T19C7` is a `;`-separated list of sections, each
//! keyed by its first character. The `@` section carries the device ID and is
//! always first; `T` carries the temperature in `<decimal>C<hex>` form.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{EtvError, Result};

/// Key of the section holding the device ID; also the record's first character.
pub const ID_KEY: char = '@';
/// Key of the section holding the temperature.
pub const TEMPERATURE_KEY: char = 'T';

// ── TelemetryRecord ───────────────────────────────────────────────────────────

/// Parsed, immutable compact telemetry record.
///
/// Safe to share between threads; the string-keyed view is built at most once.
#[derive(Debug)]
pub struct TelemetryRecord {
    raw: String,
    sections: HashMap<char, String>,
    by_string_key: OnceLock<HashMap<String, String>>,
}

impl TelemetryRecord {
    /// Parse `raw`, failing on an empty section, a repeated key or a missing ID.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.chars().count() < 2 || !raw.starts_with(ID_KEY) {
            return Err(EtvError::MalformedRecord(format!(
                "expected '{}' followed by an ID: {:?}",
                ID_KEY, raw
            )));
        }

        let mut sections = HashMap::new();
        for section in raw.split(';') {
            let section = section.trim();
            let mut chars = section.chars();
            let Some(key) = chars.next() else {
                return Err(EtvError::MalformedRecord(format!(
                    "empty section in {:?}",
                    raw
                )));
            };
            let value = chars.as_str();
            if value.is_empty() {
                return Err(EtvError::MalformedRecord(format!(
                    "section '{}' has no value in {:?}",
                    key, raw
                )));
            }
            if sections.insert(key, value.to_string()).is_some() {
                return Err(EtvError::DuplicateSection(key));
            }
        }

        if !sections.contains_key(&ID_KEY) {
            return Err(EtvError::MissingId(raw.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            sections,
            by_string_key: OnceLock::new(),
        })
    }

    /// The record exactly as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Device ID from the `@` section.
    pub fn id(&self) -> &str {
        // Presence checked in `parse`.
        self.sections.get(&ID_KEY).map(String::as_str).unwrap_or("")
    }

    /// Sections keyed by their leading character, values without the key.
    pub fn sections(&self) -> &HashMap<char, String> {
        &self.sections
    }

    /// The sections keyed by one-character strings, computed once on first use.
    pub fn by_string_key(&self) -> &HashMap<String, String> {
        self.by_string_key.get_or_init(|| {
            self.sections
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect()
        })
    }

    /// Temperature in °C, or `None` when the record has no `T` section.
    pub fn temperature(&self) -> Result<Option<f32>> {
        self.sections
            .get(&TEMPERATURE_KEY)
            .map(|t| parse_temperature_ddch(t))
            .transpose()
    }
}

// ── Temperature decoding ──────────────────────────────────────────────────────

/// Decode a `<decimal>C<hex>` temperature such as `19C7` (19 + 7/16 °C).
pub fn parse_temperature_ddch(token: &str) -> Result<f32> {
    let malformed = || EtvError::MalformedRecord(format!("bad temperature {:?}", token));

    if !token.is_ascii() || token.len() < 3 {
        return Err(malformed());
    }
    let (whole, tail) = token.split_at(token.len() - 2);
    let sixteenths = tail[1..].chars().next().and_then(|c| c.to_digit(16));
    match (whole.parse::<i32>(), sixteenths) {
        (Ok(w), Some(s)) => Ok(w as f32 + s as f32 / 16.0),
        _ => Err(malformed()),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
