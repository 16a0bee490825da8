//! Configuration type definitions.

use crate::constants::{DEFAULT_LABELS, ledger, location, route, stream};
use crate::error::Result;
use crate::store::StorePaths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Record store settings.
    pub store: StoreConfig,

    /// Stream processing settings.
    pub stream: StreamConfig,

    /// Detector settings.
    pub detector: DetectorConfig,

    /// Location tracking settings.
    pub location: LocationConfig,

    /// Route planning settings.
    pub route: RouteConfig,
}

/// Where the ledgers and captures live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store directory; the platform data directory when unset.
    pub dir: Option<PathBuf>,

    /// Active ledger file name.
    pub detections_file: String,

    /// Archive ledger file name.
    pub repairs_file: String,

    /// Captures directory, relative to the store directory unless absolute.
    pub captures_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: None,
            detections_file: ledger::DETECTIONS_FILE.to_string(),
            repairs_file: ledger::REPAIRS_FILE.to_string(),
            captures_dir: PathBuf::from(ledger::CAPTURES_DIR),
        }
    }
}

impl StoreConfig {
    /// Store directory, falling back to the platform data directory.
    pub fn resolve_dir(&self) -> Result<PathBuf> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => super::data_dir(),
        }
    }

    /// Ledger paths inside `dir`.
    pub fn paths_in(&self, dir: &std::path::Path) -> StorePaths {
        StorePaths::with_names(dir, &self.detections_file, &self.repairs_file)
    }

    /// Captures directory for a store in `dir`.
    pub fn captures_in(&self, dir: &std::path::Path) -> PathBuf {
        dir.join(&self.captures_dir)
    }
}

/// Frame scheduling and capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Run inference on every Nth frame.
    pub skip_interval: u64,

    /// Detector confidence threshold.
    pub confidence_threshold: f32,

    /// Detector IoU threshold.
    pub iou_threshold: f32,

    /// Minimum seconds between captures.
    pub cooldown_secs: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            skip_interval: stream::DEFAULT_SKIP_INTERVAL,
            confidence_threshold: stream::DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: stream::DEFAULT_IOU_THRESHOLD,
            cooldown_secs: stream::DEFAULT_COOLDOWN_SECS,
        }
    }
}

/// Detector output interpretation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Category label for each class index.
    pub labels: Vec<String>,

    /// Font for label text on captures. A system font is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_font: Option<PathBuf>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            labels: DEFAULT_LABELS.iter().map(ToString::to_string).collect(),
            label_font: None,
        }
    }
}

/// Location tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Background IP refresh period.
    pub refresh_interval_secs: u64,

    /// GPS fixes older than this are considered stale.
    pub gps_max_age_secs: u64,

    /// Per-request timeout for IP lookups.
    pub lookup_timeout_secs: u64,

    /// IP geolocation service URLs, tried in order.
    pub services: Vec<String>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: location::DEFAULT_REFRESH_INTERVAL_SECS,
            gps_max_age_secs: location::DEFAULT_GPS_MAX_AGE_SECS,
            lookup_timeout_secs: location::DEFAULT_LOOKUP_TIMEOUT_SECS,
            services: location::DEFAULT_SERVICES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl LocationConfig {
    /// Refresh period as a duration.
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// GPS freshness window as a duration.
    pub const fn gps_max_age(&self) -> Duration {
        Duration::from_secs(self.gps_max_age_secs)
    }

    /// Lookup timeout as a duration.
    pub const fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

/// Route planning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Number of detections to route when not given on the command line.
    pub default_count: usize,

    /// Average travel speed for time estimates.
    pub average_speed_kmh: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            default_count: route::DEFAULT_COUNT,
            average_speed_kmh: route::DEFAULT_AVERAGE_SPEED_KMH,
        }
    }
}
