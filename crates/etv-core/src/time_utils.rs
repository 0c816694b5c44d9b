use chrono::{DateTime, NaiveDate, TimeZone as _, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{EtvError, Result};
use crate::models::LocalDay;

/// Time zone assumed for UK household bulk data.
pub const DEFAULT_TIMEZONE: Tz = Tz::Europe__London;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Resolve an IANA name (or `"auto"` for the system zone) into a [`Tz`].
pub fn resolve_timezone(tz_name: &str) -> Result<Tz> {
    let name = if tz_name.eq_ignore_ascii_case("auto") {
        get_system_timezone()
    } else {
        tz_name.to_string()
    };
    name.parse::<Tz>()
        .map_err(|_| EtvError::InvalidTimezone(name.clone()))
}

// ── Local days ────────────────────────────────────────────────────────────────

/// Local calendar day in `tz` of the instant `dt`.
pub fn local_day_of(dt: DateTime<Utc>, tz: Tz) -> LocalDay {
    LocalDay::from_date(dt.with_timezone(&tz).date_naive())
}

/// Local calendar day in `tz` of a UTC epoch-seconds timestamp.
///
/// Returns `None` for timestamps outside chrono's representable range.
pub fn local_day_of_epoch_seconds(secs: i64, tz: Tz) -> Option<LocalDay> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|dt| local_day_of(dt, tz))
}

/// Parse a `YYYY-MM-DD` date into a [`LocalDay`].
pub fn parse_local_date(s: &str) -> Option<LocalDay> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .map(LocalDay::from_date)
}

// ── Timestamp parsing ─────────────────────────────────────────────────────────

/// Parse an ISO 8601 / RFC 3339 UTC timestamp as written in device logs.
///
/// Accepts the `Z` suffix or any fixed offset, and naive forms which are
/// taken as UTC. Returns `None` for empty strings or unrecognised formats.
pub fn parse_utc_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    // Replace trailing 'Z' with '+00:00'.
    let normalised = if let Some(stripped) = s.strip_suffix('Z') {
        format!("{}+00:00", stripped)
    } else {
        s.to_string()
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
        return Some(dt.with_timezone(&Utc));
    }

    const FMTS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in FMTS {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    warn!("could not parse timestamp \"{}\"", s);
    None
}

// ── Tests ──────────────────────────────────────────────────────────────────────
