//! Locked, crash-safe persistence for the installed-plugin registry

use super::types::InstalledRegistry;
use crate::domain::locking::{LockGuard, LockManager, LockScope};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Store for the registry document
///
/// All mutation goes through [`RegistryStore::write`], which re-reads the
/// document under lock, applies the update, and persists atomically via a
/// temp file and rename. Readers never need a lock; they observe either
/// the pre- or post-write snapshot.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    /// Path of the registry document
    path: PathBuf,

    /// Lock manager scoped to this registry's lock directory
    locks: Arc<LockManager>,

    /// Bounded wait applied to every lock acquisition
    lock_timeout: Duration,
}

impl RegistryStore {
    /// Open a store for the given registry path
    pub fn open(
        path: impl Into<PathBuf>,
        locks: Arc<LockManager>,
        lock_timeout: Duration,
    ) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        locks.initialize()?;

        Ok(Self {
            path,
            locks,
            lock_timeout,
        })
    }

    /// Path of the registry document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current registry snapshot
    ///
    /// A missing file is a valid empty registry; a present but unparseable
    /// file is an error.
    pub fn read(&self) -> Result<InstalledRegistry> {
        if !self.path.exists() {
            return Ok(InstalledRegistry::new());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::Corrupted(format!(
                "registry file {} is not valid: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Apply a mutation to the registry under lock
    ///
    /// Acquires the caller's scope lock, then the shared registry lock, so
    /// writers in any scope serialize on the same document. The closure
    /// sees the freshly re-read mapping; returning an error aborts the
    /// write and leaves the file untouched.
    pub async fn write<F>(&self, scope: LockScope, holder: &str, update: F) -> Result<InstalledRegistry>
    where
        F: FnOnce(&mut InstalledRegistry) -> Result<()>,
    {
        // The registry lock is always innermost; a caller asking for it
        // directly gets just the one lock
        let _scope_lock = match scope {
            LockScope::Registry => None,
            other => Some(self.lock(other, holder).await?),
        };
        let _registry_lock = self
            .locks
            .acquire(LockScope::Registry, holder, Some(self.lock_timeout))
            .await?;

        let mut registry = self.read()?;
        update(&mut registry)?;
        self.persist(&registry)?;

        debug!(path = %self.path.display(), entries = registry.len(), "Registry written");
        Ok(registry)
    }

    /// Hold a scope lock without writing
    ///
    /// Used by callers that must exclude concurrent transitions while
    /// performing read-only work.
    pub async fn lock(&self, scope: LockScope, holder: &str) -> Result<LockGuard> {
        let guard = self
            .locks
            .acquire(scope, holder, Some(self.lock_timeout))
            .await?;
        Ok(guard)
    }

    /// Persist atomically: write a sibling temp file, then rename over
    fn persist(&self, registry: &InstalledRegistry) -> Result<()> {
        let json = serde_json::to_string_pretty(registry)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::locking::LockConfig;
    use crate::domain::registry::types::{
        InstalledPlugin, PluginDescriptor, PluginState, PluginStatus,
    };
    use tempfile::TempDir;

    fn create_test_store() -> (RegistryStore, TempDir) {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let locks = Arc::new(LockManager::new(
            LockConfig::default()
                .with_lock_dir(temp.path().join("locks"))
                .with_retry_interval(Duration::from_millis(10)),
        ));
        let store = RegistryStore::open(
            temp.path().join("installed.json"),
            locks,
            Duration::from_secs(5),
        )
        .expect("Failed to open store");
        (store, temp)
    }

    fn installed(id: &str, state: PluginState) -> InstalledPlugin {
        InstalledPlugin::new(PluginDescriptor::new(id), PluginStatus::new(state, "test"))
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let (store, _temp) = create_test_store();
        let registry = store.read().expect("Absence must read as empty");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_read_corrupted_file_errors() {
        let (store, _temp) = create_test_store();
        std::fs::write(store.path(), "{ not json").unwrap();

        let err = store.read().unwrap_err();
        assert!(matches!(err, Error::Corrupted(_)));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (store, _temp) = create_test_store();

        store
            .write(LockScope::Lifecycle, "test", |reg| {
                reg.insert("a".to_string(), installed("a", PluginState::Installed));
                Ok(())
            })
            .await
            .expect("Write failed");

        let registry = store.read().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry["a"].status.state, PluginState::Installed);
        // No temp file left behind
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_failed_update_leaves_file_untouched() {
        let (store, _temp) = create_test_store();

        store
            .write(LockScope::Lifecycle, "test", |reg| {
                reg.insert("a".to_string(), installed("a", PluginState::Installed));
                Ok(())
            })
            .await
            .unwrap();

        let result = store
            .write(LockScope::Lifecycle, "test", |reg| {
                reg.clear();
                Err(Error::Other("abort".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.read().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writes_both_land() {
        let (store, _temp) = create_test_store();

        let store_a = store.clone();
        let store_b = store.clone();

        let (ra, rb) = tokio::join!(
            store_a.write(LockScope::Lifecycle, "writer-a", |reg| {
                reg.insert("a".to_string(), installed("a", PluginState::Installed));
                Ok(())
            }),
            store_b.write(LockScope::Status, "writer-b", |reg| {
                reg.insert("b".to_string(), installed("b", PluginState::Installed));
                Ok(())
            }),
        );
        ra.unwrap();
        rb.unwrap();

        let registry = store.read().unwrap();
        assert!(registry.contains_key("a"));
        assert!(registry.contains_key("b"));
    }

    #[tokio::test]
    async fn test_two_stores_share_one_document() {
        let temp = TempDir::new().unwrap();
        let make = || {
            let locks = Arc::new(LockManager::new(
                LockConfig::default()
                    .with_lock_dir(temp.path().join("locks"))
                    .with_retry_interval(Duration::from_millis(10)),
            ));
            RegistryStore::open(
                temp.path().join("installed.json"),
                locks,
                Duration::from_secs(5),
            )
            .unwrap()
        };
        let first = make();
        let second = make();

        first
            .write(LockScope::Lifecycle, "first", |reg| {
                reg.insert("a".to_string(), installed("a", PluginState::Installed));
                Ok(())
            })
            .await
            .unwrap();
        second
            .write(LockScope::Lifecycle, "second", |reg| {
                reg.insert("b".to_string(), installed("b", PluginState::Installed));
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(first.read().unwrap().len(), 2);
    }
}
