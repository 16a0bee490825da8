//! Detection subcommands: stream, submit, locate.

use super::args::{StreamArgs, SubmitArgs};
use super::progress::{create_stream_spinner, finish_progress};
use crate::config::{Config, seconds_to_duration};
use crate::error::{Error, Result};
use crate::geo::{GpsTrack, IpGeolocator, LocationCell, run_refresh_loop};
use crate::store::RecordStore;
use crate::stream::{
    DetectOptions, DirectorySource, JsonLinesSink, LabelFont, LabelMap, LogSink, ReplayDetector,
    StreamProcessor, StreamSettings, submit_image,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(|e| Error::Internal {
            message: format!("Failed to create async runtime: {e}"),
        })
}

fn geolocator(config: &Config) -> Result<IpGeolocator> {
    IpGeolocator::new(
        config.location.services.clone(),
        config.location.lookup_timeout(),
    )
}

/// `stream`: run the detection loop over a directory of frames.
pub fn stream(
    args: &StreamArgs,
    config: &Config,
    store_dir: &Path,
    stop: Arc<AtomicBool>,
    show_progress: bool,
) -> Result<()> {
    let cooldown = seconds_to_duration(
        "cooldown",
        args.cooldown.unwrap_or(config.stream.cooldown_secs),
    )?;
    let store = Arc::new(RecordStore::open_exclusive(
        config.store.paths_in(store_dir),
        "stream",
    )?);

    let detector = ReplayDetector::load(&args.detections)?;
    let labels = LabelMap::new(config.detector.labels.clone());
    let mut source = DirectorySource::open(&args.frames)?;
    info!(
        "Streaming {} frame(s) from {}",
        source.remaining(),
        args.frames.display()
    );

    let gps_track = args.gps.as_deref().map(GpsTrack::load).transpose()?;
    let label_font = match args.label_font.as_ref().or(config.detector.label_font.as_ref()) {
        Some(path) => Some(LabelFont::load(path)?),
        None => LabelFont::discover(),
    };
    let pinned = args.location.point();
    let location = Arc::new(pinned.map_or_else(
        || LocationCell::new(config.location.gps_max_age()),
        LocationCell::pinned,
    ));

    // Background refresh only runs when the location is not pinned.
    let refresher = if pinned.is_none() && !args.no_ip_lookup {
        let runtime = build_runtime()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = runtime.spawn(run_refresh_loop(
            Arc::clone(&location),
            geolocator(config)?,
            config.location.refresh_interval(),
            shutdown_rx,
        ));
        Some((runtime, shutdown_tx, handle))
    } else {
        None
    };

    let settings = StreamSettings {
        skip_interval: args.skip.unwrap_or(config.stream.skip_interval),
        detect: DetectOptions {
            confidence_threshold: args
                .confidence
                .unwrap_or(config.stream.confidence_threshold),
            iou_threshold: args.iou.unwrap_or(config.stream.iou_threshold),
        },
        cooldown,
        captures_dir: config.store.captures_in(store_dir),
        frame_limit: args.max_frames,
    };

    let mut processor =
        StreamProcessor::new(detector, labels, Arc::clone(&store), location, settings)
            .with_stop_flag(stop)
            .with_sink(Box::new(LogSink));
    match label_font {
        Some(font) => processor = processor.with_label_font(font),
        None => warn!("No label font found; captures are labelled without text"),
    }
    if let Some(track) = gps_track {
        info!("Replaying {} GPS report(s)", track.len());
        processor = processor.with_gps_track(track);
    }
    if let Some(events) = &args.events {
        processor = processor.with_sink(Box::new(JsonLinesSink::append_to(events)?));
    }

    let source_name = args
        .frames
        .file_name()
        .map_or_else(|| "frames".to_string(), |n| n.to_string_lossy().into_owned());
    let spinner = create_stream_spinner(&source_name, show_progress && !args.no_progress);
    if let Some(pb) = &spinner {
        processor = processor.with_progress(pb.clone());
    }

    let summary = processor.run(&mut source);
    debug!("Processor state after run: {:?}", processor.state());
    finish_progress(
        spinner.as_ref(),
        &format!("{} frames, {} captures", summary.frames, summary.captures),
    );

    if let Some((runtime, shutdown_tx, handle)) = refresher {
        let _ = shutdown_tx.send(true);
        if let Err(e) = runtime.block_on(handle) {
            warn!("Location refresh task ended abnormally: {e}");
        }
        runtime.shutdown_timeout(Duration::from_secs(1));
    }

    if args.json {
        let text = serde_json::to_string_pretty(&summary).map_err(|e| Error::Internal {
            message: format!("Failed to serialize summary: {e}"),
        })?;
        println!("{text}");
    } else {
        println!(
            "Processed {} frames ({} inferred): {} detections, {} captured",
            summary.frames, summary.inferred_frames, summary.detections, summary.captures
        );
        if summary.detector_errors > 0 || summary.capture_errors > 0 {
            println!(
                "Errors: {} detector, {} capture",
                summary.detector_errors, summary.capture_errors
            );
        }
    }
    Ok(())
}

/// `submit`: detect on one image and store the first detection.
pub fn submit(args: &SubmitArgs, config: &Config, store: &RecordStore) -> Result<()> {
    let detector = ReplayDetector::load(&args.detections)?;
    let labels = LabelMap::new(config.detector.labels.clone());
    let options = DetectOptions {
        confidence_threshold: args
            .confidence
            .unwrap_or(config.stream.confidence_threshold),
        iou_threshold: config.stream.iou_threshold,
    };

    match submit_image(
        &detector,
        &labels,
        &options,
        store,
        &args.image,
        args.location.point(),
    )? {
        Some(id) => {
            let record = store.get(id)?;
            println!(
                "Saved {} #{id} ({:.2}) at {}",
                record.category.title(),
                record.confidence,
                record.location_label()
            );
        }
        None => println!("No defects detected in {}", args.image.display()),
    }
    Ok(())
}

/// `locate`: one IP geolocation lookup.
pub fn locate(json: bool, config: &Config) -> Result<()> {
    let runtime = build_runtime()?;
    let locator = geolocator(config)?;
    let found = runtime.block_on(locator.locate())?;

    if json {
        let value = serde_json::json!({
            "latitude": found.point.latitude,
            "longitude": found.point.longitude,
            "city": found.city,
            "country": found.country,
        });
        println!("{value:#}");
    } else {
        println!(
            "{}, {} ({:.6}, {:.6})",
            found.city, found.country, found.point.latitude, found.point.longitude
        );
    }
    Ok(())
}
