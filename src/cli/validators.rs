//! CLI argument validators.
//!
//! Shared validation functions for CLI argument parsing.

use std::time::Duration;

/// Parse and validate confidence value (0.0-1.0).
pub fn parse_confidence(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if !(0.0..=1.0).contains(&value) {
        return Err(format!(
            "confidence must be between 0.0 and 1.0, got {value}"
        ));
    }

    Ok(value)
}

/// Parse a confidence value (0.0-1.0) as stored in the ledger.
pub fn parse_score(s: &str) -> Result<f64, String> {
    parse_bounded_float(s, 0.0, 1.0, "confidence")
}

/// Parse and validate a bounded float value.
///
/// # Arguments
///
/// * `s` - The string to parse
/// * `min` - Minimum allowed value (inclusive)
/// * `max` - Maximum allowed value (inclusive)
/// * `name` - Name of the parameter for error messages
pub fn parse_bounded_float(s: &str, min: f64, max: f64, name: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if !(min..=max).contains(&value) {
        return Err(format!(
            "{name} must be between {min} and {max}, got {value}"
        ));
    }

    Ok(value)
}

/// Parse and validate latitude value (-90.0 to 90.0).
pub fn parse_latitude(s: &str) -> Result<f64, String> {
    parse_bounded_float(s, -90.0, 90.0, "latitude")
}

/// Parse and validate longitude value (-180.0 to 180.0).
pub fn parse_longitude(s: &str) -> Result<f64, String> {
    parse_bounded_float(s, -180.0, 180.0, "longitude")
}

/// Parse a non-negative number of seconds that fits in a [`Duration`].
pub fn parse_seconds(s: &str) -> Result<f64, String> {
    let value = parse_bounded_float(s, 0.0, f64::MAX, "seconds")?;
    Duration::try_from_secs_f64(value)
        .map_err(|_| format!("{value} seconds is too large for a duration"))?;
    Ok(value)
}

/// Parse a duration such as `90s`, `30m`, `1h` or a bare number of seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (number, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(pos) => s.split_at(pos),
        None => (s, "s"),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| format!("'{s}' is not a valid duration"))?;

    let seconds = match unit {
        "s" => value,
        "m" => value.saturating_mul(60),
        "h" => value.saturating_mul(3600),
        "d" => value.saturating_mul(86_400),
        _ => return Err(format!("unknown duration unit in '{s}' (use s, m, h or d)")),
    };

    Ok(Duration::from_secs(seconds))
}
