//! IP geolocation fallback.

use super::GeoPoint;
use crate::error::{Error, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Result of an IP geolocation lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct IpLocation {
    /// Estimated position.
    pub point: GeoPoint,
    /// Reported city, or "Unknown".
    pub city: String,
    /// Reported country, or "Unknown".
    pub country: String,
}

/// Queries a list of public IP geolocation services in order.
pub struct IpGeolocator {
    client: Client,
    services: Vec<String>,
}

impl IpGeolocator {
    /// Build a geolocator with a per-request timeout.
    pub fn new(services: Vec<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal {
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self { client, services })
    }

    /// Try each service until one reports coordinates.
    pub async fn locate(&self) -> Result<IpLocation> {
        for url in &self.services {
            match self.query(url).await {
                Ok(Some(location)) => return Ok(location),
                Ok(None) => debug!("{url} returned no coordinates"),
                Err(e) => debug!("{url} failed: {e}"),
            }
        }

        Err(Error::Geolocation {
            reason: format!("none of {} service(s) returned a location", self.services.len()),
        })
    }

    async fn query(&self, url: &str) -> std::result::Result<Option<IpLocation>, reqwest::Error> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_service_response(&body))
    }
}

/// Extract a location from a geolocation service JSON body.
///
/// Services disagree on field names: `latitude`/`lat`, `longitude`/`lon`,
/// `country_name`/`country`. Zero or missing coordinates count as no answer.
pub fn parse_service_response(body: &str) -> Option<IpLocation> {
    let value: Value = serde_json::from_str(body).ok()?;

    let lat = number_field(&value, &["latitude", "lat"])?;
    let lon = number_field(&value, &["longitude", "lon"])?;

    Some(IpLocation {
        point: GeoPoint::new(lat, lon),
        city: text_field(&value, &["city"]),
        country: text_field(&value, &["country_name", "country"]),
    })
}

fn number_field(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| {
        let n = match value.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }?;
        (n.is_finite() && n != 0.0).then_some(n)
    })
}

fn text_field(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| value.get(key)?.as_str().filter(|s| !s.is_empty()))
        .unwrap_or(crate::constants::location::UNKNOWN)
        .to_string()
}
