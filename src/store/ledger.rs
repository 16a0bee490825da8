//! CSV ledger encoding.
//!
//! Rows are read by header name so column order does not matter. A row whose
//! id, timestamp or a non-blank numeric field cannot be parsed is skipped with
//! a warning; blank numeric fields read as 0, and blank coordinates read as an
//! unknown location.

use super::record::{Category, DetectionRecord, RepairRecord};
use crate::constants::ledger::{DETECTION_HEADER, REPAIR_HEADER};
use crate::constants::{DEFAULT_LABELS, TIMESTAMP_FORMAT};
use crate::error::{Error, Result};
use crate::geo::GeoPoint;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::warn;

/// A ledger row as text, before field parsing.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Image_Path")]
    image_path: String,
    #[serde(rename = "Latitude")]
    latitude: String,
    #[serde(rename = "Longitude")]
    longitude: String,
    #[serde(rename = "Detection_Type")]
    detection_type: Option<String>,
    #[serde(rename = "Confidence")]
    confidence: String,
    #[serde(rename = "Repair_Date")]
    repair_date: String,
    #[serde(rename = "Technician")]
    technician: String,
    #[serde(rename = "Notes")]
    notes: String,
}

/// Create `path` holding only `header` if it does not exist yet.
pub fn ensure_ledger(path: &Path, header: &[&str]) -> Result<()> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => {
            let mut writer = csv::Writer::from_writer(file);
            writer
                .write_record(header)
                .map_err(|e| Error::storage_write(path, e))?;
            writer.flush().map_err(|e| Error::storage_write(path, e))
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(Error::storage_write(path, e)),
    }
}

/// Ensure both ledgers exist.
pub fn ensure_ledgers(detections: &Path, repairs: &Path) -> Result<()> {
    ensure_ledger(detections, &DETECTION_HEADER)?;
    ensure_ledger(repairs, &REPAIR_HEADER)
}

fn open_reader(path: &Path) -> Result<Option<csv::Reader<File>>> {
    match File::open(path) {
        Ok(file) => Ok(Some(
            csv::ReaderBuilder::new().flexible(true).from_reader(file),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::storage_read(path, e)),
    }
}

fn read_rows(path: &Path) -> Result<Vec<(u64, RawRow)>> {
    let Some(mut reader) = open_reader(path)? else {
        return Ok(Vec::new());
    };

    let mut rows = Vec::new();
    for (index, result) in reader.deserialize::<RawRow>().enumerate() {
        // Line numbers are 1-based and the header occupies line 1.
        let line = index as u64 + 2;
        match result {
            Ok(row) => rows.push((line, row)),
            Err(e) if e.is_io_error() => return Err(Error::storage_read(path, e)),
            Err(e) => warn!("{}:{line}: skipping malformed row: {e}", path.display()),
        }
    }
    Ok(rows)
}

/// Read all parseable active detections.
pub fn read_detections(path: &Path) -> Result<Vec<DetectionRecord>> {
    Ok(read_rows(path)?
        .into_iter()
        .filter_map(|(line, row)| match parse_detection(&row) {
            Ok(record) => Some(record),
            Err(reason) => {
                warn!("{}:{line}: skipping detection: {reason}", path.display());
                None
            }
        })
        .collect())
}

/// Read all parseable archived repairs.
pub fn read_repairs(path: &Path) -> Result<Vec<RepairRecord>> {
    Ok(read_rows(path)?
        .into_iter()
        .filter_map(|(line, row)| match parse_repair(&row) {
            Ok(record) => Some(record),
            Err(reason) => {
                warn!("{}:{line}: skipping repair: {reason}", path.display());
                None
            }
        })
        .collect())
}

/// Largest id mentioned by any row, parseable or not, in the ledger.
pub fn max_id(path: &Path) -> Result<u64> {
    Ok(read_rows(path)?
        .iter()
        .filter_map(|(_, row)| row.id.trim().parse::<u64>().ok())
        .max()
        .unwrap_or(0))
}

fn parse_detection(row: &RawRow) -> std::result::Result<DetectionRecord, String> {
    let id = row
        .id
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("invalid ID '{}'", row.id))?;
    let timestamp = parse_timestamp(&row.timestamp, "Timestamp")?;
    let location = parse_location(&row.latitude, &row.longitude)?;
    let confidence = parse_number(&row.confidence, "Confidence")?;

    let category = row
        .detection_type
        .as_deref()
        .map_or_else(|| Category::new(DEFAULT_LABELS[0]), Category::new);

    Ok(DetectionRecord {
        id,
        timestamp,
        image_path: row.image_path.clone(),
        location,
        category,
        confidence,
    })
}

fn parse_repair(row: &RawRow) -> std::result::Result<RepairRecord, String> {
    let detection = parse_detection(row)?;
    let repair_date = parse_timestamp(&row.repair_date, "Repair_Date")?;
    Ok(RepairRecord {
        detection,
        repair_date,
        technician: row.technician.clone(),
        notes: row.notes.clone(),
    })
}

fn parse_timestamp(value: &str, field: &str) -> std::result::Result<NaiveDateTime, String> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|_| format!("invalid {field} '{value}'"))
}

fn parse_number(value: &str, field: &str) -> std::result::Result<f64, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0.0);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| format!("invalid {field} '{value}'"))
}

fn parse_location(lat: &str, lon: &str) -> std::result::Result<Option<GeoPoint>, String> {
    if lat.trim().is_empty() && lon.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(GeoPoint::new(
        parse_number(lat, "Latitude")?,
        parse_number(lon, "Longitude")?,
    )))
}

fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn detection_fields(record: &DetectionRecord) -> [String; 7] {
    let (lat, lon) = record.location.map_or_else(
        || (String::new(), String::new()),
        |p| (p.latitude.to_string(), p.longitude.to_string()),
    );
    [
        record.id.to_string(),
        format_timestamp(&record.timestamp),
        record.image_path.clone(),
        lat,
        lon,
        record.category.as_str().to_string(),
        record.confidence.to_string(),
    ]
}

fn repair_fields(record: &RepairRecord) -> Vec<String> {
    let mut fields = detection_fields(&record.detection).to_vec();
    fields.push(format_timestamp(&record.repair_date));
    fields.push(record.technician.clone());
    fields.push(record.notes.clone());
    fields
}

fn append_fields(path: &Path, fields: &[String]) -> Result<()> {
    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| Error::storage_write(path, e))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer
        .write_record(fields)
        .map_err(|e| Error::storage_write(path, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| Error::storage_write(path, e.into_error()))?;
    file.sync_data().map_err(|e| Error::storage_write(path, e))
}

/// Append one detection row.
pub fn append_detection(path: &Path, record: &DetectionRecord) -> Result<()> {
    append_fields(path, &detection_fields(record))
}

/// Append one repair row.
pub fn append_repair(path: &Path, record: &RepairRecord) -> Result<()> {
    append_fields(path, &repair_fields(record))
}

/// Copy the ledger at `src` into `dest`, dropping rows whose ID equals `id`.
///
/// Rows that do not parse as detections are carried over verbatim so a
/// rewrite never loses data the reader merely could not interpret.
pub fn write_without(src: &Path, dest: &Path, id: u64) -> Result<()> {
    let mut contents = Vec::new();
    File::open(src)
        .and_then(|mut f| f.read_to_end(&mut contents))
        .map_err(|e| Error::storage_read(src, e))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(contents.as_slice());
    let headers = reader
        .headers()
        .map_err(|e| Error::storage_read(src, e))?
        .clone();
    let id_column = headers.iter().position(|h| h == "ID");

    let file = File::create(dest).map_err(|e| Error::storage_write(dest, e))?;
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);
    writer
        .write_record(&headers)
        .map_err(|e| Error::storage_write(dest, e))?;

    for result in reader.records() {
        let record = result.map_err(|e| Error::storage_read(src, e))?;
        let row_id = id_column
            .and_then(|col| record.get(col))
            .and_then(|v| v.trim().parse::<u64>().ok());
        if row_id == Some(id) {
            continue;
        }
        writer
            .write_record(&record)
            .map_err(|e| Error::storage_write(dest, e))?;
    }

    let mut file = writer
        .into_inner()
        .map_err(|e| Error::storage_write(dest, e.into_error()))?;
    file.flush().map_err(|e| Error::storage_write(dest, e))?;
    file.sync_all().map_err(|e| Error::storage_write(dest, e))
}
