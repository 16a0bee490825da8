//! Error types for pavewatch.

/// Result type alias for pavewatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for pavewatch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration directory could not be determined.
    #[error("could not determine configuration directory for this platform")]
    ConfigDirNotFound,

    /// Data directory could not be determined.
    #[error("could not determine data directory for this platform")]
    DataDirNotFound,

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}'")]
    ConfigRead {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Failed to write configuration file.
    #[error("failed to write config file '{path}'")]
    ConfigWrite {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize configuration.
    #[error("failed to serialize config")]
    ConfigSerialize {
        /// Underlying serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// Failed to open or read a record ledger.
    #[error("failed to read record store '{path}'")]
    StorageRead {
        /// Path to the ledger file.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to write a record ledger.
    #[error("failed to write record store '{path}'")]
    StorageWrite {
        /// Path to the ledger file.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The in-process writer lock was poisoned by a panicking writer.
    #[error("record store writer lock poisoned")]
    StoreLockPoisoned,

    /// Record store is held by another process.
    #[error("record store is locked by another process: {path}")]
    StoreLocked {
        /// Path to the lock file.
        path: std::path::PathBuf,
    },

    /// Failed to create lock file.
    #[error("failed to create lock file '{path}'")]
    LockCreate {
        /// Path to the lock file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to remove lock file.
    #[error("failed to remove lock file '{path}'")]
    LockRemove {
        /// Path to the lock file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Detection id not present in the active ledger.
    #[error("Detection not found")]
    RecordNotFound {
        /// The requested id.
        id: u64,
    },

    /// Route start index outside the point set.
    #[error("start index {index} out of range for {len} point(s)")]
    InvalidStartIndex {
        /// Requested start index.
        index: usize,
        /// Number of points.
        len: usize,
    },

    /// Nothing to route.
    #[error("No detections found")]
    NoDetections,

    /// Detector invocation failed.
    #[error("detector failed: {reason}")]
    Detector {
        /// Description of the failure.
        reason: String,
    },

    /// Failed to load detector replay data.
    #[error("failed to load detections from '{path}'")]
    DetectorLoad {
        /// Path to the replay file.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to load a font for label text.
    #[error("failed to load label font '{path}'")]
    FontLoad {
        /// Path to the font file.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to load a recorded GPS track.
    #[error("failed to load GPS track from '{path}'")]
    GpsTrackLoad {
        /// Path to the track file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a frame image.
    #[error("failed to read frame '{path}'")]
    FrameRead {
        /// Path to the image.
        path: std::path::PathBuf,
        /// Underlying image error.
        #[source]
        source: image::ImageError,
    },

    /// Failed to write a captured frame.
    #[error("failed to write frame '{path}'")]
    FrameWrite {
        /// Path to the image.
        path: std::path::PathBuf,
        /// Underlying image error.
        #[source]
        source: image::ImageError,
    },

    /// Failed to create output directory.
    #[error("failed to create output directory '{path}'")]
    OutputDirCreateFailed {
        /// Path to the output directory.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// All geolocation services failed.
    #[error("geolocation lookup failed: {reason}")]
    Geolocation {
        /// Description of the failure.
        reason: String,
    },

    /// Failed to write event output.
    #[error("failed to write event: {source}")]
    EventWrite {
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// Internal error (for unexpected failures).
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Wrap a failure reading the ledger at `path`.
    pub fn storage_read(
        path: &std::path::Path,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::StorageRead {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    /// Wrap a failure writing the ledger at `path`.
    pub fn storage_write(
        path: &std::path::Path,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::StorageWrite {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    /// Whether this is a storage-layer failure.
    pub const fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::StorageRead { .. }
                | Self::StorageWrite { .. }
                | Self::StoreLockPoisoned
                | Self::StoreLocked { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_not_found_message() {
        let err = Error::RecordNotFound { id: 3 };
        assert_eq!(err.to_string(), "Detection not found");
        assert!(!err.is_storage());
    }

    #[test]
    fn test_storage_helpers_classify() {
        let io = std::io::Error::other("disk gone");
        let err = Error::storage_write(std::path::Path::new("/tmp/detections.csv"), io);
        assert!(err.is_storage());
        assert!(err.to_string().contains("detections.csv"));
    }
}
