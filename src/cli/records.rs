//! Ledger subcommands: add, list, show, fix, stats, route, report, unlock.

use super::args::{AddArgs, ListArgs, RouteArgs};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::locking::FileLock;
use crate::planner::{RouteOptions, plan_route};
use crate::store::{
    DetectionFilter, DetectionRecord, DetectionStats, RecordStore, RepairRecord,
    default_report_name, sort_by_confidence_desc, title_case, write_report,
};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Open the record store described by `config` in `store_dir`.
pub fn open_store(config: &Config, store_dir: &Path) -> Result<RecordStore> {
    RecordStore::open(config.store.paths_in(store_dir))
}

/// `add`: append a detection by hand.
pub fn add(args: &AddArgs, store: &RecordStore) -> Result<()> {
    let id = store.add(
        &args.image,
        args.location.point(),
        &args.category,
        args.confidence,
    )?;
    println!("Added {} #{id}", title_case(&args.category));
    Ok(())
}

/// `list`: print active or archived detections.
pub fn list(args: &ListArgs, store: &RecordStore) -> Result<()> {
    let filter = DetectionFilter {
        category: args.category.clone(),
        band: args.risk,
        located_only: false,
    };

    if args.archived {
        let mut repairs: Vec<RepairRecord> = store
            .list_archived()?
            .into_iter()
            .filter(|r| filter.accepts(&r.detection))
            .collect();
        if args.by_confidence {
            repairs.sort_by(|a, b| {
                b.detection
                    .confidence
                    .partial_cmp(&a.detection.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        if args.json {
            print_json(&repairs)?;
        } else if repairs.is_empty() {
            println!("No repairs recorded.");
        } else {
            for r in &repairs {
                println!(
                    "{}  fixed {} by {}{}",
                    format_row(&r.detection),
                    r.repair_date.format(crate::constants::TIMESTAMP_FORMAT),
                    if r.technician.is_empty() { "-" } else { r.technician.as_str() },
                    if r.notes.is_empty() {
                        String::new()
                    } else {
                        format!(" ({})", r.notes)
                    }
                );
            }
        }
        return Ok(());
    }

    let mut records = filter.apply(store.list_active()?);
    if args.by_confidence {
        sort_by_confidence_desc(&mut records);
    }

    if args.json {
        print_json(&records)?;
    } else if records.is_empty() {
        println!("No detections found.");
    } else {
        for r in &records {
            println!("{}", format_row(r));
        }
    }
    Ok(())
}

/// `show`: print one active detection.
pub fn show(id: u64, json: bool, store: &RecordStore) -> Result<()> {
    let record = store.get(id)?;
    if json {
        return print_json(&record);
    }

    println!("Detection #{}", record.id);
    println!("  Type:       {}", record.category);
    println!(
        "  Confidence: {:.2} ({} risk)",
        record.confidence,
        record.band()
    );
    println!("  Location:   {}", record.location_label());
    println!(
        "  Time:       {}",
        record.timestamp.format(crate::constants::TIMESTAMP_FORMAT)
    );
    println!("  Image:      {}", record.image_path);
    Ok(())
}

/// `fix`: archive a repaired detection.
pub fn fix(id: u64, technician: &str, notes: &str, store: &RecordStore) -> Result<()> {
    let message = store.promote(id, technician, notes)?;
    println!("{message}");
    Ok(())
}

/// `stats`: print aggregate statistics.
pub fn stats(json: bool, store: &RecordStore) -> Result<()> {
    let stats = store.stats()?;
    if json {
        return print_json(&stats);
    }
    print_stats(&stats);
    Ok(())
}

fn print_stats(stats: &DetectionStats) {
    println!("Active detections: {}", stats.total_detections);
    for (category, count) in &stats.by_category {
        println!("  {:<12} {count}", title_case(category));
    }
    println!("Fixed:             {}", stats.fixed_count);
    for (category, count) in &stats.fixed_by_category {
        println!("  {:<12} {count}", title_case(category));
    }
    println!("Avg confidence:    {:.1}%", stats.avg_confidence);
    println!(
        "Risk:              {} high, {} medium, {} low",
        stats.high_severity, stats.medium_severity, stats.low_severity
    );
    println!("Today:             {}", stats.today_count);
    println!("Last 7 days:       {}", stats.week_count);
}

/// `route`: plan and print a repair route.
pub fn route(args: &RouteArgs, config: &Config, store: &RecordStore) -> Result<()> {
    let options = RouteOptions {
        count: args.count.unwrap_or(config.route.default_count),
        category: args.category.clone(),
        average_speed_kmh: config.route.average_speed_kmh,
    };

    let plan = plan_route(store.list_active()?, &options)?;
    if args.json {
        return print_json(&plan);
    }

    println!(
        "Route over {} detection(s): {:.2} km, about {} min",
        plan.points.len(),
        plan.total_distance,
        plan.estimated_minutes
    );
    for (stop, record) in plan.points.iter().enumerate() {
        println!("  {:>2}. {}", stop + 1, format_row(record));
    }
    if plan.skipped_unlocated > 0 {
        println!(
            "Skipped {} detection(s) with unknown location",
            plan.skipped_unlocated
        );
    }
    Ok(())
}

/// `report`: write the CSV summary report.
pub fn report(output: Option<PathBuf>, store: &RecordStore) -> Result<()> {
    let generated = Local::now().naive_local();
    let path = output.unwrap_or_else(|| PathBuf::from(default_report_name(generated)));

    let stats = store.stats()?;
    let detections = store.list_active()?;
    let written = write_report(&path, &stats, &detections, generated)?;

    info!("Report covers {} detection(s)", detections.len());
    println!("Report written to: {}", written.display());
    Ok(())
}

/// `unlock`: remove a lock file left by a crashed writer.
pub fn unlock(store_dir: &Path, force: bool, stale_after: Duration) -> Result<()> {
    if !FileLock::is_locked(store_dir) {
        println!("Store is not locked: {}", store_dir.display());
        return Ok(());
    }

    if !force && !FileLock::is_stale(store_dir, stale_after) {
        let holder = FileLock::holder(store_dir).map_or_else(
            || "unknown holder".to_string(),
            |h| format!("pid {} on {} ({}) since {}", h.pid, h.hostname, h.purpose, h.started),
        );
        println!("Lock is held by {holder}; use --force to remove it anyway.");
        return Err(Error::StoreLocked {
            path: FileLock::lock_path_for(store_dir),
        });
    }

    FileLock::remove_stale(store_dir)?;
    println!("Removed lock: {}", FileLock::lock_path_for(store_dir).display());
    Ok(())
}

fn format_row(r: &DetectionRecord) -> String {
    format!(
        "#{:<4} {:<10} {:.2} {:<6} {:<24} {}",
        r.id,
        r.category,
        r.confidence,
        r.band(),
        r.location_label(),
        r.timestamp.format(crate::constants::TIMESTAMP_FORMAT)
    )
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| Error::Internal {
        message: format!("Failed to serialize output: {e}"),
    })?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::store::Category;
    use chrono::NaiveDate;

    #[test]
    fn test_format_row_unknown_location() {
        let record = DetectionRecord {
            id: 12,
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(3, 4, 5)
                .unwrap(),
            image_path: String::new(),
            location: None,
            category: Category::new("crack"),
            confidence: 0.456,
        };
        let row = format_row(&record);
        assert!(row.starts_with("#12"));
        assert!(row.contains("0.46"));
        assert!(row.contains("low"));
        assert!(row.contains("Unknown"));
        assert!(row.ends_with("2024-01-02 03:04:05"));

        let located = DetectionRecord {
            location: Some(GeoPoint::new(1.5, 2.5)),
            ..record
        };
        assert!(format_row(&located).contains("1.5, 2.5"));
    }
}
