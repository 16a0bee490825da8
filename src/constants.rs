//! Application-wide constants.
//!
//! Defaults, ledger column names and file names live here so the store,
//! the stream processor and the CLI agree on them.

/// Application name used for config directories and user-facing messages.
pub const APP_NAME: &str = "pavewatch";

/// Default label list mapping detector class indices to categories.
pub const DEFAULT_LABELS: &[&str] = &["pothole", "crack"];

/// Lock file name placed in the store directory.
pub const LOCK_FILE_NAME: &str = ".pavewatch.lock";

/// Timestamp format used in the ledgers.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Compact timestamp used for capture file names and events.
pub const CAPTURE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Stream processing defaults.
pub mod stream {
    /// Run inference on every Nth frame.
    pub const DEFAULT_SKIP_INTERVAL: u64 = 3;

    /// Detector confidence threshold.
    pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;

    /// Detector IoU threshold for non-maximum suppression.
    pub const DEFAULT_IOU_THRESHOLD: f32 = 0.5;

    /// Minimum seconds between two automatic captures.
    pub const DEFAULT_COOLDOWN_SECS: f64 = 5.0;

    /// JPEG quality for saved captures.
    pub const CAPTURE_JPEG_QUALITY: u8 = 70;

    /// Box outline color (magenta).
    pub const BOX_COLOR: [u8; 3] = [255, 0, 255];

    /// Box outline thickness in pixels.
    pub const BOX_THICKNESS: u32 = 3;

    /// Label text color.
    pub const LABEL_TEXT_COLOR: [u8; 3] = [255, 255, 255];

    /// Label text height in pixels.
    pub const LABEL_FONT_SIZE: f32 = 18.0;

    /// Fonts tried for label text when none is configured.
    pub const SYSTEM_FONT_PATHS: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ];

    /// Image extensions accepted by the directory frame source.
    pub const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
}

/// Location tracking defaults.
pub mod location {
    /// Background refresh period in seconds.
    pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

    /// GPS fixes older than this fall back to IP geolocation.
    pub const DEFAULT_GPS_MAX_AGE_SECS: u64 = 120;

    /// Per-request timeout for IP geolocation services.
    pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 3;

    /// IP geolocation services, tried in order.
    pub const DEFAULT_SERVICES: &[&str] = &[
        "https://ipapi.co/json/",
        "http://ip-api.com/json/",
        "https://geolocation-db.com/json/",
    ];

    /// Text shown when no location is known.
    pub const UNKNOWN: &str = "Unknown";
}

/// Route planning constants.
pub mod route {
    /// Mean Earth radius in kilometres.
    pub const EARTH_RADIUS_KM: f64 = 6371.0;

    /// Default number of highest-confidence detections to route.
    pub const DEFAULT_COUNT: usize = 10;

    /// Assumed average travel speed.
    pub const DEFAULT_AVERAGE_SPEED_KMH: f64 = 30.0;
}

/// Confidence value bounds and bands.
pub mod confidence {
    /// Minimum valid confidence value.
    pub const MIN: f32 = 0.0;
    /// Maximum valid confidence value.
    pub const MAX: f32 = 1.0;
    /// Lower bound of the high band.
    pub const HIGH: f64 = 0.8;
    /// Lower bound of the medium band.
    pub const MEDIUM: f64 = 0.5;
}

/// Ledger file names and headers.
pub mod ledger {
    /// Active detections file name.
    pub const DETECTIONS_FILE: &str = "detections.csv";

    /// Archived repairs file name.
    pub const REPAIRS_FILE: &str = "repairs.csv";

    /// Captured frames directory name.
    pub const CAPTURES_DIR: &str = "dashcam_captures";

    /// Active ledger header.
    pub const DETECTION_HEADER: [&str; 7] = [
        "ID",
        "Timestamp",
        "Image_Path",
        "Latitude",
        "Longitude",
        "Detection_Type",
        "Confidence",
    ];

    /// Archive ledger header.
    pub const REPAIR_HEADER: [&str; 10] = [
        "ID",
        "Timestamp",
        "Image_Path",
        "Latitude",
        "Longitude",
        "Detection_Type",
        "Confidence",
        "Repair_Date",
        "Technician",
        "Notes",
    ];
}
