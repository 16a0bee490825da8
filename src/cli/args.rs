//! CLI argument definitions.

use super::validators::{
    parse_confidence, parse_duration, parse_latitude, parse_longitude, parse_score, parse_seconds,
};
use crate::geo::GeoPoint;
use crate::store::ConfidenceBand;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Road defect detection, repair ledger and route planning.
#[derive(Debug, Parser)]
#[command(name = "pavewatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options shared by every subcommand.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Record store directory (overrides config).
    #[arg(long, global = true, env = "PAVEWATCH_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Configuration file (default: platform config directory).
    #[arg(long, global = true, env = "PAVEWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase verbosity (-v: debug, -vv: trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process a directory of frames and capture detections.
    Stream(StreamArgs),
    /// Run the detector on one image and store the first detection.
    Submit(SubmitArgs),
    /// Record a detection manually.
    Add(AddArgs),
    /// List detections.
    List(ListArgs),
    /// Show one active detection.
    Show {
        /// Detection id.
        id: u64,
        /// Print JSON.
        #[arg(long)]
        json: bool,
    },
    /// Mark a detection as repaired and move it to the archive.
    Fix {
        /// Detection id.
        id: u64,
        /// Who carried out the repair.
        #[arg(short, long, default_value = "")]
        technician: String,
        /// Free-form repair notes.
        #[arg(short, long, default_value = "")]
        notes: String,
    },
    /// Show detection statistics.
    Stats {
        /// Print JSON.
        #[arg(long)]
        json: bool,
    },
    /// Plan a repair route over the highest-confidence detections.
    Route(RouteArgs),
    /// Export a CSV summary report.
    Report {
        /// Report file (default: `report_<timestamp>.csv` in the current directory).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Look up the current location by IP.
    Locate {
        /// Print JSON.
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration.
    Config {
        /// Configuration action to perform.
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Remove a leftover store lock.
    Unlock {
        /// Remove the lock even if it is recent.
        #[arg(long)]
        force: bool,
        /// Treat locks older than this as stale (e.g., 30m, 1h).
        #[arg(long, value_parser = parse_duration, default_value = "1h")]
        stale_after: Duration,
    },
}

/// Config subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Create default configuration file.
    Init,
    /// Display current configuration.
    Show,
    /// Print configuration file path.
    Path,
}

/// A position given on the command line.
#[derive(Debug, Clone, Args)]
pub struct LocationArgs {
    /// Latitude (-90.0 to 90.0).
    #[arg(long, value_parser = parse_latitude, requires = "lon", allow_hyphen_values = true, env = "PAVEWATCH_LATITUDE")]
    pub lat: Option<f64>,

    /// Longitude (-180.0 to 180.0).
    #[arg(long, value_parser = parse_longitude, requires = "lat", allow_hyphen_values = true, env = "PAVEWATCH_LONGITUDE")]
    pub lon: Option<f64>,
}

impl LocationArgs {
    /// The point, when both coordinates were given.
    pub fn point(&self) -> Option<GeoPoint> {
        self.lat.zip(self.lon).map(|(lat, lon)| GeoPoint::new(lat, lon))
    }
}

/// Arguments for `stream`.
#[derive(Debug, Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct StreamArgs {
    /// Directory of frame images, processed in file-name order.
    pub frames: PathBuf,

    /// Detector output to replay (JSON Lines keyed by frame number).
    #[arg(short, long, env = "PAVEWATCH_DETECTIONS")]
    pub detections: PathBuf,

    /// Run inference on every Nth frame.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..), env = "PAVEWATCH_SKIP_INTERVAL")]
    pub skip: Option<u64>,

    /// Detector confidence threshold (0.0-1.0).
    #[arg(short = 'c', long, value_parser = parse_confidence, env = "PAVEWATCH_CONFIDENCE")]
    pub confidence: Option<f32>,

    /// Detector IoU threshold (0.0-1.0).
    #[arg(long, value_parser = parse_confidence)]
    pub iou: Option<f32>,

    /// Minimum seconds between captures.
    #[arg(long, value_parser = parse_seconds, env = "PAVEWATCH_COOLDOWN")]
    pub cooldown: Option<f64>,

    /// Stop after this many frames.
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// Append capture events to this JSON Lines file.
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Pin the location instead of tracking it.
    #[command(flatten)]
    pub location: LocationArgs,

    /// Recorded GPS reports (JSON Lines keyed by frame number).
    #[arg(long, conflicts_with = "lat", env = "PAVEWATCH_GPS_TRACK")]
    pub gps: Option<PathBuf>,

    /// Font file for box labels (overrides config).
    #[arg(long, env = "PAVEWATCH_LABEL_FONT")]
    pub label_font: Option<PathBuf>,

    /// Do not query IP geolocation services.
    #[arg(long)]
    pub no_ip_lookup: bool,

    /// Hide the progress spinner.
    #[arg(long)]
    pub no_progress: bool,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `submit`.
#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// Image to analyze.
    pub image: PathBuf,

    /// Detector output to replay (frame 1 is used).
    #[arg(short, long, env = "PAVEWATCH_DETECTIONS")]
    pub detections: PathBuf,

    /// Detector confidence threshold (0.0-1.0).
    #[arg(short = 'c', long, value_parser = parse_confidence)]
    pub confidence: Option<f32>,

    /// Where the image was taken.
    #[command(flatten)]
    pub location: LocationArgs,
}

/// Arguments for `add`.
#[derive(Debug, Args)]
pub struct AddArgs {
    /// Path of the captured image.
    #[arg(long)]
    pub image: String,

    /// Defect category (e.g., pothole, crack).
    #[arg(short = 't', long = "type", default_value = "pothole")]
    pub category: String,

    /// Detector confidence (0.0-1.0).
    #[arg(short = 'c', long, value_parser = parse_score)]
    pub confidence: f64,

    /// Where the defect was seen.
    #[command(flatten)]
    pub location: LocationArgs,
}

/// Arguments for `list`.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// List repaired detections instead of active ones.
    #[arg(long)]
    pub archived: bool,

    /// Only this category (`all` for every category).
    #[arg(short = 't', long = "type")]
    pub category: Option<String>,

    /// Only this risk level (high, medium, low).
    #[arg(long)]
    pub risk: Option<ConfidenceBand>,

    /// Sort by confidence, highest first.
    #[arg(long)]
    pub by_confidence: bool,

    /// Print JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `route`.
#[derive(Debug, Args)]
pub struct RouteArgs {
    /// Number of detections to visit.
    #[arg(short = 'n', long, value_parser = clap::value_parser!(usize))]
    pub count: Option<usize>,

    /// Only this category (`all` for every category).
    #[arg(short = 't', long = "type")]
    pub category: Option<String>,

    /// Print JSON.
    #[arg(long)]
    pub json: bool,
}
