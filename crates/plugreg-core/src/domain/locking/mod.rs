//! Named cross-process locks for the plugin registry
//!
//! This module provides file-based advisory locking so that several
//! processes sharing one registry location never interleave their writes.
//!
//! # Architecture
//!
//! - **Scopes**: `LockScope` names the locks (`lifecycle`, `status`,
//!   `registry`)
//! - **Lock Manager**: `LockManager` acquires locks with a bounded wait
//! - **Guards**: RAII-style lock guards for automatic release
//!
//! # Features
//!
//! - Atomic lock-file claim for cross-process safety
//! - Bounded wait with configurable timeout and retry interval
//! - Automatic reclaim of locks whose holder process died
//!
//! # Example
//!
//! ```ignore
//! use plugreg_core::domain::locking::{LockConfig, LockManager, LockScope};
//!
//! let manager = LockManager::new(LockConfig::default().with_lock_dir(dir));
//! manager.initialize()?;
//!
//! let guard = manager.acquire(LockScope::Registry, "store write", None).await?;
//!
//! // Mutate the registry file...
//!
//! // Lock is automatically released when guard is dropped
//! ```

pub mod guard;
pub mod manager;
pub mod types;

// Re-export main types
pub use guard::LockGuard;
pub use manager::LockManager;
pub use types::{LockConfig, LockError, LockInfo, LockResult, LockScope};
