//! Lock guards for RAII-style lock management
//!
//! Guards automatically release locks when dropped, ensuring proper cleanup
//! even in the presence of panics or early returns.

use super::types::{LockInfo, LockScope};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

/// A guard holding one named lock
///
/// The lock file is removed when the guard is dropped.
#[derive(Debug)]
pub struct LockGuard {
    /// Information about the held lock
    info: LockInfo,

    /// Lock file backing this guard
    path: PathBuf,

    /// Whether the lock has been explicitly released
    released: bool,
}

impl LockGuard {
    /// Create a new lock guard
    pub(crate) fn new(info: LockInfo, path: PathBuf) -> Self {
        Self {
            info,
            path,
            released: false,
        }
    }

    /// Get the lock ID
    pub fn id(&self) -> Uuid {
        self.info.id
    }

    /// Get the lock scope
    pub fn scope(&self) -> LockScope {
        self.info.scope
    }

    /// Get the lock info
    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    /// Explicitly release the lock (normally done automatically on drop)
    pub fn release(mut self) {
        self.do_release();
    }

    /// Internal release implementation
    fn do_release(&mut self) {
        if !self.released {
            self.released = true;
            // Only unlink while the file still carries this guard's lock;
            // after a forced reclaim the path may hold someone else's claim
            let still_ours = std::fs::read_to_string(&self.path)
                .ok()
                .and_then(|contents| serde_json::from_str::<LockInfo>(&contents).ok())
                .map(|info| info.id == self.info.id)
                .unwrap_or(false);
            if still_ours {
                let _ = std::fs::remove_file(&self.path);
            }
            debug!(scope = %self.info.scope, "Lock released");
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.do_release();
    }
}

impl fmt::Display for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lock[{}]", self.info.scope)
    }
}
