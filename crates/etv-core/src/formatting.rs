/// Format a value as the shortest single-precision decimal that round-trips,
/// always showing a fractional part.
///
/// Matches the number rendering of the reference CSV outputs: integral values
/// keep a trailing `.0`, magnitudes outside `[1e-3, 1e7)` use `E` notation.
///
/// # Examples
///
/// ```
/// use etv_core::formatting::format_float;
///
/// assert_eq!(format_float(1.5532478), "1.5532478");
/// assert_eq!(format_float(0.0), "0.0");
/// assert_eq!(format_float(2.0), "2.0");
/// assert_eq!(format_float(12345678.0), "1.2345678E7");
/// ```
pub fn format_float(value: f64) -> String {
    let v = value as f32;
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let abs = v.abs();
    if (1e-3..1e7).contains(&abs) {
        let s = v.to_string();
        if s.contains('.') {
            s
        } else {
            format!("{}.0", s)
        }
    } else {
        // `{:e}` gives e.g. "1.2345678e7" or "5e-4".
        let s = format!("{:e}", v);
        let (mantissa, exponent) = s.split_once('e').unwrap_or((s.as_str(), "0"));
        if mantissa.contains('.') {
            format!("{}E{}", mantissa, exponent)
        } else {
            format!("{}.0E{}", mantissa, exponent)
        }
    }
}

/// Format an optional value, rendering `None` as an empty field.
pub fn format_optional_float(value: Option<f64>) -> String {
    value.map(format_float).unwrap_or_default()
}

/// Wrap a text field in double quotes, doubling any embedded quotes.
///
/// # Examples
///
/// ```
/// use etv_core::formatting::quote;
///
/// assert_eq!(quote("5013"), "\"5013\"");
/// assert_eq!(quote("a\"b"), "\"a\"\"b\"");
/// ```
pub fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
