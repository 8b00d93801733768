//! Lock types and error definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Result type for lock operations
pub type LockResult<T> = std::result::Result<T, LockError>;

/// Lock errors
#[derive(Error, Debug, Clone)]
pub enum LockError {
    /// Lock acquisition timed out
    #[error("Lock timeout: '{resource}' is held by {holder}")]
    Timeout { resource: String, holder: String },

    /// Lock is already held by another process
    #[error("Lock contention: '{resource}' is held by process {holder_pid}")]
    Contention { resource: String, holder_pid: u32 },

    /// Lock is stale (holder process died)
    #[error("Stale lock detected: '{resource}' (holder pid {holder_pid} is not running)")]
    StaleLock {
        resource: String,
        holder_pid: u32,
        /// Id of the lock observed stale; reclaim discards only this lock
        lock_id: Uuid,
    },

    /// I/O error during lock operations
    #[error("Lock I/O error: {0}")]
    IoError(String),

    /// Lock file corruption
    #[error("Lock file corrupted: {0}")]
    Corrupted(String),
}

impl LockError {
    /// Get error code for this lock error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "E300",
            Self::Contention { .. } => "E301",
            Self::StaleLock { .. } => "E302",
            Self::IoError(_) => "E303",
            Self::Corrupted(_) => "E304",
        }
    }
}

/// Named locks guarding the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockScope {
    /// Serializes lifecycle transitions (install, uninstall, load)
    Lifecycle,
    /// Serializes direct status updates
    Status,
    /// Guards the registry file itself; taken after a scope lock
    Registry,
}

impl LockScope {
    /// Acquisition order (lower = acquired first); the registry lock is
    /// always innermost so scope holders never deadlock on it
    pub fn priority(&self) -> u8 {
        match self {
            Self::Lifecycle => 0,
            Self::Status => 1,
            Self::Registry => 2,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lifecycle => "lifecycle",
            Self::Status => "status",
            Self::Registry => "registry",
        }
    }
}

impl fmt::Display for LockScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Information about a held lock, serialized into the lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Lock ID
    pub id: Uuid,

    /// Which named lock this is
    pub scope: LockScope,

    /// Process ID of lock holder
    pub holder_pid: u32,

    /// Hostname of lock holder
    pub holder_host: String,

    /// Description of the lock holder (e.g., "install plugin-x")
    pub holder_description: String,

    /// When the lock was acquired
    pub acquired_at: DateTime<Utc>,
}

impl LockInfo {
    /// Create a new lock info for the current process
    pub fn new(scope: LockScope, holder_description: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            scope,
            holder_pid: std::process::id(),
            holder_host: gethostname::gethostname().to_string_lossy().into_owned(),
            holder_description,
            acquired_at: Utc::now(),
        }
    }

    /// Check if the lock is held by the current process
    pub fn is_held_by_self(&self) -> bool {
        self.holder_pid == std::process::id()
    }
}

/// Configuration for the lock manager
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Base directory for lock files
    pub lock_dir: std::path::PathBuf,

    /// Default timeout for lock acquisition
    pub default_timeout: Duration,

    /// Retry interval when waiting for a lock
    pub retry_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lock_dir: std::path::PathBuf::from(".plugreg/locks"),
            default_timeout: Duration::from_secs(30),
            retry_interval: Duration::from_millis(100),
        }
    }
}

impl LockConfig {
    /// Create a config with a custom lock directory
    pub fn with_lock_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.lock_dir = dir.into();
        self
    }

    /// Set the default timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the retry interval
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_priority() {
        // The registry lock is innermost (taken last)
        assert!(LockScope::Lifecycle.priority() < LockScope::Registry.priority());
        assert!(LockScope::Status.priority() < LockScope::Registry.priority());
    }

    #[test]
    fn test_lock_info_creation() {
        let info = LockInfo::new(LockScope::Registry, "test-holder".to_string());

        assert_eq!(info.scope, LockScope::Registry);
        assert_eq!(info.holder_pid, std::process::id());
        assert!(info.is_held_by_self());
    }

    #[test]
    fn test_lock_error_codes() {
        let timeout_err = LockError::Timeout {
            resource: "registry".to_string(),
            holder: "pid:1234".to_string(),
        };
        assert_eq!(timeout_err.code(), "E300");

        let contention_err = LockError::Contention {
            resource: "registry".to_string(),
            holder_pid: 1234,
        };
        assert_eq!(contention_err.code(), "E301");
    }

    #[test]
    fn test_lock_config_builder() {
        let config = LockConfig::default()
            .with_lock_dir("/tmp/locks")
            .with_timeout(Duration::from_secs(60))
            .with_retry_interval(Duration::from_millis(10));

        assert_eq!(config.lock_dir, std::path::PathBuf::from("/tmp/locks"));
        assert_eq!(config.default_timeout, Duration::from_secs(60));
        assert_eq!(config.retry_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(LockScope::Lifecycle.to_string(), "lifecycle");
        assert_eq!(LockScope::Status.to_string(), "status");
        assert_eq!(LockScope::Registry.to_string(), "registry");
    }
}
