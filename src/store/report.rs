//! Summary report export.

use super::record::DetectionRecord;
use super::stats::DetectionStats;
use crate::constants::TIMESTAMP_FORMAT;
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Default report file name for a generation time.
pub fn default_report_name(generated: NaiveDateTime) -> String {
    format!("report_{}.csv", generated.format("%Y%m%d_%H%M%S"))
}

/// Write a report with a summary block followed by one row per detection.
///
/// Rows have varying widths, so the writer is flexible.
pub fn write_report(
    path: &Path,
    stats: &DetectionStats,
    detections: &[DetectionRecord],
    generated: NaiveDateTime,
) -> Result<PathBuf> {
    let file = File::create(path).map_err(|e| Error::storage_write(path, e))?;
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(file);

    let mut rows: Vec<Vec<String>> = vec![
        vec!["Road Defect Detection - Report".to_string()],
        vec![
            "Generated:".to_string(),
            generated.format(TIMESTAMP_FORMAT).to_string(),
        ],
        vec![String::new()],
        vec!["Summary Statistics".to_string()],
        summary("Total Detections", stats.total_detections),
    ];

    for (category, count) in &stats.by_category {
        rows.push(summary(&super::record::title_case(category), *count));
    }
    rows.push(summary("Fixed", stats.fixed_count));
    rows.push(vec![
        "Average Confidence".to_string(),
        format!("{:.1}%", stats.avg_confidence),
    ]);
    rows.push(summary("High Severity", stats.high_severity));
    rows.push(summary("Medium Severity", stats.medium_severity));
    rows.push(summary("Low Severity", stats.low_severity));
    rows.push(vec![String::new()]);
    rows.push(vec!["Detailed Detections".to_string()]);
    rows.push(
        ["ID", "Type", "Confidence", "Latitude", "Longitude", "Timestamp"]
            .iter()
            .map(ToString::to_string)
            .collect(),
    );

    for d in detections {
        let (lat, lng) = d.location.map_or_else(
            || (String::new(), String::new()),
            |p| (p.latitude.to_string(), p.longitude.to_string()),
        );
        rows.push(vec![
            d.id.to_string(),
            d.category.to_string(),
            d.confidence.to_string(),
            lat,
            lng,
            d.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        ]);
    }

    for row in &rows {
        writer
            .write_record(row)
            .map_err(|e| Error::storage_write(path, e))?;
    }
    writer.flush().map_err(|e| Error::storage_write(path, e))?;

    Ok(path.to_path_buf())
}

fn summary(label: &str, value: usize) -> Vec<String> {
    vec![label.to_string(), value.to_string()]
}
