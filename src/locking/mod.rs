//! Store directory locking.

mod file_lock;

pub use file_lock::{FileLock, LockInfo, cleanup_all_locks, register_lock, unregister_lock};
