//! Cross-process ownership of a store directory.

use crate::constants::LOCK_FILE_NAME;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Poll period while waiting for a busy lock.
const RETRY_PERIOD: Duration = Duration::from_millis(25);

/// Lock file content for debugging.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process ID that holds the lock.
    pub pid: u32,
    /// Hostname of the machine.
    pub hostname: String,
    /// When the lock was acquired.
    pub started: DateTime<Utc>,
    /// What the holder is doing (e.g. "stream", "fix").
    pub purpose: String,
}

/// RAII guard for a store directory lock.
#[derive(Debug)]
pub struct FileLock {
    lock_path: PathBuf,
}

impl FileLock {
    /// Attempt to take the lock for `store_dir` without waiting.
    pub fn acquire(store_dir: &Path, purpose: &str) -> Result<Self> {
        let lock_path = Self::lock_path_for(store_dir);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path);

        match file {
            Ok(mut f) => {
                let info = LockInfo {
                    pid: std::process::id(),
                    hostname: hostname::get().map_or_else(
                        |_| "unknown".to_string(),
                        |h| h.to_string_lossy().into_owned(),
                    ),
                    started: Utc::now(),
                    purpose: purpose.to_string(),
                };

                let json = serde_json::to_string_pretty(&info).unwrap_or_else(|_| "{}".to_string());
                let _ = f.write_all(json.as_bytes());

                register_lock(&lock_path);

                Ok(Self { lock_path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::StoreLocked { path: lock_path })
            }
            Err(e) => Err(Error::LockCreate {
                path: lock_path,
                source: e,
            }),
        }
    }

    /// Take the lock, retrying while another process holds it, for at most `wait`.
    pub fn acquire_waiting(store_dir: &Path, purpose: &str, wait: Duration) -> Result<Self> {
        let deadline = Instant::now() + wait;
        loop {
            match Self::acquire(store_dir, purpose) {
                Err(Error::StoreLocked { path }) => {
                    if Instant::now() >= deadline {
                        return Err(Error::StoreLocked { path });
                    }
                    std::thread::sleep(RETRY_PERIOD);
                }
                other => return other,
            }
        }
    }

    /// Get the lock file path for a store directory.
    pub fn lock_path_for(store_dir: &Path) -> PathBuf {
        store_dir.join(LOCK_FILE_NAME)
    }

    /// Check if a lock file exists.
    pub fn is_locked(store_dir: &Path) -> bool {
        Self::lock_path_for(store_dir).exists()
    }

    /// Read the holder information, if the lock file is present and readable.
    pub fn holder(store_dir: &Path) -> Option<LockInfo> {
        let contents = fs::read_to_string(Self::lock_path_for(store_dir)).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Check if a lock is stale (older than `max_age`).
    pub fn is_stale(store_dir: &Path, max_age: Duration) -> bool {
        let lock_path = Self::lock_path_for(store_dir);

        if let Ok(metadata) = fs::metadata(&lock_path)
            && let Ok(modified) = metadata.modified()
        {
            return modified.elapsed().unwrap_or_default() > max_age;
        }
        false
    }

    /// Remove a lock left behind by a crashed process.
    pub fn remove_stale(store_dir: &Path) -> Result<()> {
        let lock_path = Self::lock_path_for(store_dir);
        fs::remove_file(&lock_path).map_err(|e| Error::LockRemove {
            path: lock_path,
            source: e,
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
        unregister_lock(&self.lock_path);
    }
}

/// Global registry of active lock paths for cleanup on signal.
static ACTIVE_LOCKS: std::sync::LazyLock<std::sync::Mutex<Vec<PathBuf>>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(Vec::new()));

/// Register a lock path for cleanup on signal.
pub fn register_lock(path: &Path) {
    if let Ok(mut locks) = ACTIVE_LOCKS.lock() {
        locks.push(path.to_path_buf());
    }
}

/// Unregister a lock path after normal cleanup.
pub fn unregister_lock(path: &Path) {
    if let Ok(mut locks) = ACTIVE_LOCKS.lock() {
        locks.retain(|p| p != path);
    }
}

/// Clean up all registered locks. Called on signal.
pub fn cleanup_all_locks() {
    if let Ok(locks) = ACTIVE_LOCKS.lock() {
        for lock_path in locks.iter() {
            let _ = fs::remove_file(lock_path);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_acquire_and_release_lock() {
        let temp_dir = TempDir::new().unwrap();

        let lock = FileLock::acquire(temp_dir.path(), "test");
        assert!(lock.is_ok());
        assert!(FileLock::is_locked(temp_dir.path()));
        assert_eq!(
            FileLock::holder(temp_dir.path()).unwrap().pid,
            std::process::id()
        );

        drop(lock);
        assert!(!FileLock::is_locked(temp_dir.path()));
    }

    #[test]
    #[serial]
    fn test_double_lock_fails() {
        let temp_dir = TempDir::new().unwrap();

        let lock1 = FileLock::acquire(temp_dir.path(), "first");
        assert!(lock1.is_ok());

        let lock2 = FileLock::acquire(temp_dir.path(), "second");
        assert!(matches!(lock2, Err(Error::StoreLocked { .. })));
    }

    #[test]
    #[serial]
    fn test_acquire_waiting_times_out() {
        let temp_dir = TempDir::new().unwrap();
        let _held = FileLock::acquire(temp_dir.path(), "held").unwrap();

        let start = Instant::now();
        let result = FileLock::acquire_waiting(temp_dir.path(), "waiter", Duration::from_millis(100));
        assert!(matches!(result, Err(Error::StoreLocked { .. })));
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_lock_path_format() {
        let path = FileLock::lock_path_for(Path::new("/var/lib/pavewatch"));
        assert_eq!(path.to_string_lossy(), "/var/lib/pavewatch/.pavewatch.lock");
    }

    #[test]
    #[serial]
    fn test_remove_stale_lock() {
        let temp_dir = TempDir::new().unwrap();
        File::create(FileLock::lock_path_for(temp_dir.path())).unwrap();

        assert!(!FileLock::is_stale(temp_dir.path(), Duration::from_secs(3600)));
        FileLock::remove_stale(temp_dir.path()).unwrap();
        assert!(!FileLock::is_locked(temp_dir.path()));
    }

    #[test]
    #[serial]
    fn test_cleanup_all_locks_removes_registered_files() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = FileLock::lock_path_for(temp_dir.path());

        File::create(&lock_path).unwrap();
        assert!(lock_path.exists());

        register_lock(&lock_path);
        cleanup_all_locks();
        unregister_lock(&lock_path);

        assert!(!lock_path.exists());
    }
}
