//! Lock manager for the registry's named locks
//!
//! The lock manager claims a lock by staging its payload and hard-linking
//! it into the lock path, so processes sharing one registry directory
//! contend on the filesystem itself and never observe a partial claim.
//! It handles:
//! - Bounded waiting with a configurable retry interval
//! - Stale lock detection and reclaim when the holder process died
//! - Corrupted lock file reclaim

use super::guard::LockGuard;
use super::types::{LockConfig, LockError, LockInfo, LockResult, LockScope};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

/// Lock manager for the registry's named locks
#[derive(Debug, Clone)]
pub struct LockManager {
    /// Configuration
    config: LockConfig,
}

impl LockManager {
    /// Create a new lock manager with the given configuration
    pub fn new(config: LockConfig) -> Self {
        Self { config }
    }

    /// Create a lock manager with a custom lock directory
    pub fn with_lock_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(LockConfig::default().with_lock_dir(dir))
    }

    /// Get the configuration
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Initialize the lock manager (create lock directory if needed)
    pub fn initialize(&self) -> LockResult<()> {
        if !self.config.lock_dir.exists() {
            std::fs::create_dir_all(&self.config.lock_dir).map_err(|e| {
                LockError::IoError(format!(
                    "Failed to create lock directory {}: {}",
                    self.config.lock_dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Acquire a named lock, waiting up to `timeout` (None = default)
    ///
    /// Stale locks (holder process dead, or unreadable lock file) are
    /// reclaimed without counting against the timeout.
    pub async fn acquire(
        &self,
        scope: LockScope,
        holder_description: &str,
        timeout: Option<Duration>,
    ) -> LockResult<LockGuard> {
        let timeout = timeout.unwrap_or(self.config.default_timeout);

        debug!(
            scope = %scope,
            timeout_ms = timeout.as_millis(),
            "Attempting to acquire lock"
        );

        let start = Instant::now();

        loop {
            match self.try_acquire(scope, holder_description) {
                Ok(guard) => {
                    debug!(
                        scope = %scope,
                        elapsed_ms = start.elapsed().as_millis(),
                        "Lock acquired"
                    );
                    return Ok(guard);
                }
                Err(LockError::Contention {
                    resource,
                    holder_pid,
                }) => {
                    if start.elapsed() >= timeout {
                        return Err(LockError::Timeout {
                            resource,
                            holder: format!("pid:{}", holder_pid),
                        });
                    }
                    sleep(self.config.retry_interval).await;
                }
                Err(LockError::StaleLock {
                    resource: _,
                    holder_pid,
                    lock_id,
                }) => {
                    // Reclaim and retry immediately; does not count
                    // against the timeout
                    warn!(scope = %scope, holder_pid, "Reclaiming stale lock");
                    self.reclaim(scope, Some(lock_id))?;
                }
                Err(LockError::Corrupted(msg)) => {
                    warn!(scope = %scope, %msg, "Reclaiming corrupted lock file");
                    self.reclaim(scope, None)?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Try to acquire a lock without waiting
    pub fn try_acquire(&self, scope: LockScope, holder_description: &str) -> LockResult<LockGuard> {
        let path = self.lock_file_path(scope);

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LockError::IoError(format!("Failed to create lock directory: {}", e))
                })?;
            }
        }

        // Stage the full payload, then hard-link it into place: the link
        // either creates the lock file complete or fails, so contenders
        // never observe a half-written lock
        let lock_info = LockInfo::new(scope, holder_description.to_string());
        let staged = self
            .config
            .lock_dir
            .join(format!("{}.{}.tmp", scope.as_str(), lock_info.id));
        let json = serde_json::to_string_pretty(&lock_info)
            .map_err(|e| LockError::IoError(format!("Failed to serialize lock info: {}", e)))?;
        std::fs::write(&staged, json)
            .map_err(|e| LockError::IoError(format!("Failed to write lock file: {}", e)))?;

        let linked = std::fs::hard_link(&staged, &path);
        let _ = std::fs::remove_file(&staged);

        match linked {
            Ok(()) => Ok(LockGuard::new(lock_info, path)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                match self.read_lock_file(&path) {
                    Ok(existing) => {
                        if is_process_alive(existing.holder_pid) {
                            Err(LockError::Contention {
                                resource: scope.as_str().to_string(),
                                holder_pid: existing.holder_pid,
                            })
                        } else {
                            Err(LockError::StaleLock {
                                resource: scope.as_str().to_string(),
                                holder_pid: existing.holder_pid,
                                lock_id: existing.id,
                            })
                        }
                    }
                    // The holder released between our claim and read
                    Err(LockError::IoError(_)) if !path.exists() => Err(LockError::Contention {
                        resource: scope.as_str().to_string(),
                        holder_pid: 0,
                    }),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(LockError::IoError(format!(
                "Failed to create lock file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Inspect a lock without acquiring it
    pub fn lock_info(&self, scope: LockScope) -> LockResult<Option<LockInfo>> {
        let path = self.lock_file_path(scope);
        if !path.exists() {
            return Ok(None);
        }
        self.read_lock_file(&path).map(Some)
    }

    /// Get the path to a lock file
    pub fn lock_file_path(&self, scope: LockScope) -> PathBuf {
        self.config.lock_dir.join(format!("{}.lock", scope.as_str()))
    }

    /// Discard a stale or corrupted lock file atomically
    ///
    /// The file is renamed aside first, so exactly one contender wins the
    /// reclaim; losers see the rename fail and go back to waiting. The
    /// parked file is re-checked before discard: if it is no longer the
    /// lock we observed (`expected`, None for a corrupted observation)
    /// and its holder is alive, a fresh claim raced in between and is
    /// restored instead of discarded.
    fn reclaim(&self, scope: LockScope, expected: Option<uuid::Uuid>) -> LockResult<()> {
        let path = self.lock_file_path(scope);
        let parked = self
            .config
            .lock_dir
            .join(format!("{}.{}.reclaim", scope.as_str(), uuid::Uuid::new_v4()));

        match std::fs::rename(&path, &parked) {
            Ok(()) => {}
            // Another contender reclaimed first
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(LockError::IoError(format!(
                    "Failed to park stale lock file: {}",
                    e
                )));
            }
        }

        let parked_info: Option<LockInfo> = std::fs::read_to_string(&parked)
            .ok()
            .and_then(|c| serde_json::from_str(&c).ok());
        let stole_live_claim = parked_info
            .map(|info| expected != Some(info.id) && is_process_alive(info.holder_pid))
            .unwrap_or(false);

        if stole_live_claim {
            // hard_link refuses to clobber, so an even newer claim stays
            let _ = std::fs::hard_link(&parked, &path);
        } else {
            info!(scope = %scope, "Lock force-released");
        }
        let _ = std::fs::remove_file(&parked);
        Ok(())
    }

    fn read_lock_file(&self, path: &Path) -> LockResult<LockInfo> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LockError::IoError(format!("Failed to read lock file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| LockError::Corrupted(format!("Failed to parse lock file: {}", e)))
    }
}

/// Check if a process is still alive
fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        // On Unix, we can use kill with signal 0 to check if process exists
        use std::process::Command;
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    {
        // On Windows, use tasklist
        use std::process::Command;
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid)])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }

    #[cfg(not(any(unix, windows)))]
    {
        // Fallback: assume process is alive
        true
    }
}
