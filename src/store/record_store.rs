//! Active/archive detection ledgers.
//!
//! All mutations run under one in-process writer mutex, and under the store
//! directory lock file so another process cannot interleave writes. A store
//! opened with [`RecordStore::open_exclusive`] holds the lock file for its
//! whole lifetime; otherwise each write takes it briefly.

use super::ledger;
use super::record::{Category, DetectionRecord, RepairRecord};
use super::stats::{DetectionStats, compute_stats};
use crate::error::{Error, Result};
use crate::geo::GeoPoint;
use crate::locking::FileLock;
use chrono::{Local, NaiveDateTime};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a short-lived writer waits for the directory lock.
const WRITE_LOCK_WAIT: Duration = Duration::from_secs(2);

/// Locations of the two ledgers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    /// Directory holding both ledgers and the lock file.
    pub dir: PathBuf,
    /// Active detections ledger.
    pub detections: PathBuf,
    /// Archived repairs ledger.
    pub repairs: PathBuf,
}

impl StorePaths {
    /// Standard ledger names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        use crate::constants::ledger::{DETECTIONS_FILE, REPAIRS_FILE};
        Self::with_names(dir, DETECTIONS_FILE, REPAIRS_FILE)
    }

    /// Custom ledger names inside `dir`.
    pub fn with_names(dir: &Path, detections: &str, repairs: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            detections: dir.join(detections),
            repairs: dir.join(repairs),
        }
    }
}

/// Detection ledger with promotion to a repair archive.
#[derive(Debug)]
pub struct RecordStore {
    paths: StorePaths,
    writer: Mutex<()>,
    held_lock: Option<FileLock>,
}

impl RecordStore {
    /// Open (creating if needed) the ledgers described by `paths`.
    pub fn open(paths: StorePaths) -> Result<Self> {
        fs::create_dir_all(&paths.dir).map_err(|e| Error::OutputDirCreateFailed {
            path: paths.dir.clone(),
            source: e,
        })?;
        let store = Self {
            paths,
            writer: Mutex::new(()),
            held_lock: None,
        };
        store.init()?;
        Ok(store)
    }

    /// Open and take ownership of the store directory until dropped.
    ///
    /// Fails with [`Error::StoreLocked`] if another process owns it.
    pub fn open_exclusive(paths: StorePaths, purpose: &str) -> Result<Self> {
        let mut store = Self::open(paths)?;
        store.held_lock = Some(FileLock::acquire(&store.paths.dir, purpose)?);
        info!("Opened record store {} ({purpose})", store.paths.dir.display());
        Ok(store)
    }

    /// Ledger locations.
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Create both ledgers with header rows if they are missing.
    pub fn init(&self) -> Result<()> {
        ledger::ensure_ledgers(&self.paths.detections, &self.paths.repairs)
    }

    /// `max(id) + 1` across both ledgers, or 1 when both are empty.
    pub fn next_id(&self) -> Result<u64> {
        let _guard = self.lock()?;
        self.next_id_locked()
    }

    fn next_id_locked(&self) -> Result<u64> {
        let active = ledger::max_id(&self.paths.detections)?;
        let archived = ledger::max_id(&self.paths.repairs)?;
        Ok(active.max(archived) + 1)
    }

    /// Append a detection stamped with the current local time.
    pub fn add(
        &self,
        image_path: &str,
        location: Option<GeoPoint>,
        category: &str,
        confidence: f64,
    ) -> Result<u64> {
        self.add_at(
            image_path,
            location,
            category,
            confidence,
            Local::now().naive_local(),
        )
    }

    /// Append a detection with an explicit creation time.
    pub fn add_at(
        &self,
        image_path: &str,
        location: Option<GeoPoint>,
        category: &str,
        confidence: f64,
        timestamp: NaiveDateTime,
    ) -> Result<u64> {
        let _guard = self.lock()?;
        let _dir_lock = self.write_lock("add")?;
        self.init()?;

        let id = self.next_id_locked()?;
        let record = DetectionRecord {
            id,
            timestamp,
            image_path: image_path.to_string(),
            location,
            category: Category::new(category),
            confidence,
        };
        ledger::append_detection(&self.paths.detections, &record)?;

        debug!(
            "Added detection #{id} ({category}, {confidence:.2}) at {}",
            record.location_label()
        );
        Ok(id)
    }

    /// All active detections that parse.
    pub fn list_active(&self) -> Result<Vec<DetectionRecord>> {
        let _guard = self.lock()?;
        ledger::read_detections(&self.paths.detections)
    }

    /// All archived repairs that parse.
    pub fn list_archived(&self) -> Result<Vec<RepairRecord>> {
        let _guard = self.lock()?;
        ledger::read_repairs(&self.paths.repairs)
    }

    /// Look up one active detection.
    pub fn get(&self, id: u64) -> Result<DetectionRecord> {
        self.list_active()?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(Error::RecordNotFound { id })
    }

    /// Move detection `id` into the repair archive.
    ///
    /// Either the record ends up only in the archive, or the call fails and
    /// both ledgers are as they were. Returns a confirmation message such as
    /// `"Pothole #7 has been fixed!"`.
    pub fn promote(&self, id: u64, technician: &str, notes: &str) -> Result<String> {
        self.promote_with(id, technician, notes, |from, to| fs::rename(from, to))
    }

    fn promote_with(
        &self,
        id: u64,
        technician: &str,
        notes: &str,
        commit: impl FnOnce(&Path, &Path) -> std::io::Result<()>,
    ) -> Result<String> {
        let _guard = self.lock()?;
        let _dir_lock = self.write_lock("fix")?;
        self.init()?;

        let detection = ledger::read_detections(&self.paths.detections)?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(Error::RecordNotFound { id })?;

        let repair = RepairRecord {
            detection,
            repair_date: Local::now().naive_local(),
            technician: technician.to_string(),
            notes: notes.to_string(),
        };

        let staged = self.staging_path();
        if let Err(e) = ledger::write_without(&self.paths.detections, &staged, id) {
            let _ = fs::remove_file(&staged);
            return Err(e);
        }

        let archive_len = fs::metadata(&self.paths.repairs)
            .map_err(|e| Error::storage_read(&self.paths.repairs, e))?
            .len();

        if let Err(e) = ledger::append_repair(&self.paths.repairs, &repair) {
            let _ = fs::remove_file(&staged);
            self.truncate_archive(archive_len);
            return Err(e);
        }

        if let Err(e) = commit(&staged, &self.paths.detections) {
            let _ = fs::remove_file(&staged);
            self.truncate_archive(archive_len);
            return Err(Error::storage_write(&self.paths.detections, e));
        }

        let message = format!("{} #{id} has been fixed!", repair.detection.category.title());
        info!("{message}");
        Ok(message)
    }

    /// Aggregate statistics as of now.
    pub fn stats(&self) -> Result<DetectionStats> {
        let _guard = self.lock()?;
        let active = ledger::read_detections(&self.paths.detections)?;
        let archived = ledger::read_repairs(&self.paths.repairs)?;
        Ok(compute_stats(
            &active,
            &archived,
            Local::now().date_naive(),
        ))
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .paths
            .detections
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.paths.detections.with_file_name(name)
    }

    fn truncate_archive(&self, len: u64) {
        let result = OpenOptions::new()
            .write(true)
            .open(&self.paths.repairs)
            .and_then(|f| f.set_len(len));
        if let Err(e) = result {
            warn!(
                "Could not roll back {} to {len} bytes: {e}",
                self.paths.repairs.display()
            );
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.writer.lock().map_err(|_| Error::StoreLockPoisoned)
    }

    fn write_lock(&self, purpose: &str) -> Result<Option<FileLock>> {
        if self.held_lock.is_some() {
            return Ok(None);
        }
        FileLock::acquire_waiting(&self.paths.dir, purpose, WRITE_LOCK_WAIT).map(Some)
    }
}
