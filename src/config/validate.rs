//! Configuration validation.

use crate::config::Config;
use crate::constants::confidence;
use crate::error::{Error, Result};
use std::time::Duration;

fn invalid(message: String) -> Error {
    Error::ConfigValidation { message }
}

/// Convert a seconds setting into a [`Duration`].
///
/// Negative, non-finite and out-of-range values are a `ConfigValidation` error.
pub fn seconds_to_duration(name: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        invalid(format!(
            "{name} must be a non-negative number of seconds that fits in a duration, got {secs}"
        ))
    })
}

/// Validate the entire configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_stream(config)?;
    validate_detector(config)?;
    validate_location(config)?;
    validate_route(config)?;
    Ok(())
}

fn validate_threshold(name: &str, value: f32) -> Result<()> {
    if !(confidence::MIN..=confidence::MAX).contains(&value) {
        return Err(invalid(format!(
            "{name} must be between {} and {}, got {value}",
            confidence::MIN,
            confidence::MAX
        )));
    }
    Ok(())
}

fn validate_stream(config: &Config) -> Result<()> {
    let stream = &config.stream;

    if stream.skip_interval == 0 {
        return Err(invalid("skip_interval must be at least 1".to_string()));
    }

    validate_threshold("confidence_threshold", stream.confidence_threshold)?;
    validate_threshold("iou_threshold", stream.iou_threshold)?;

    seconds_to_duration("cooldown_secs", stream.cooldown_secs)?;

    Ok(())
}

fn validate_detector(config: &Config) -> Result<()> {
    if config.detector.labels.is_empty() {
        return Err(invalid("detector labels must not be empty".to_string()));
    }
    if config.detector.labels.iter().any(|l| l.trim().is_empty()) {
        return Err(invalid("detector labels must not be blank".to_string()));
    }
    Ok(())
}

fn validate_location(config: &Config) -> Result<()> {
    let location = &config.location;

    for (name, value) in [
        ("refresh_interval_secs", location.refresh_interval_secs),
        ("gps_max_age_secs", location.gps_max_age_secs),
        ("lookup_timeout_secs", location.lookup_timeout_secs),
    ] {
        if value == 0 {
            return Err(invalid(format!("{name} must be positive")));
        }
    }

    Ok(())
}

fn validate_route(config: &Config) -> Result<()> {
    let route = &config.route;

    if route.default_count == 0 {
        return Err(invalid("route default_count must be at least 1".to_string()));
    }
    if !route.average_speed_kmh.is_finite() || route.average_speed_kmh <= 0.0 {
        return Err(invalid(format!(
            "average_speed_kmh must be positive, got {}",
            route.average_speed_kmh
        )));
    }

    Ok(())
}
