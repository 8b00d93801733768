//! Recovery of transitions abandoned by a dead process instance

use crate::domain::locking::LockScope;
use crate::domain::registry::{PluginState, PluginStatus, RegistryStore};
use crate::error::Result;
use tracing::{info, warn};

/// Reset busy entries owned by another instance back to installed
///
/// A busy state owned by a different instance id means that process died
/// (or lost the registry) mid-transition; since the external effect may
/// or may not have completed, the entry is conservatively reset to
/// `INSTALLED` rather than removed. Runs through the same locked write
/// path as normal transitions. Returns the ids that were reset.
pub async fn reset_abandoned(store: &RegistryStore, instance_id: &str) -> Result<Vec<String>> {
    let mut reset_ids = Vec::new();

    store
        .write(LockScope::Lifecycle, "startup recovery", |registry| {
            for (id, entry) in registry.iter_mut() {
                if entry.status.state.is_busy() && entry.status.owner_instance_id != instance_id {
                    warn!(
                        plugin_id = %id,
                        abandoned_state = %entry.status.state,
                        previous_owner = %entry.status.owner_instance_id,
                        "Resetting transition abandoned by a dead instance"
                    );
                    let note = format!(
                        "reset from {} after interrupted transition",
                        entry.status.state
                    );
                    entry.status =
                        PluginStatus::new(PluginState::Installed, instance_id).with_msg(note);
                    reset_ids.push(id.clone());
                }
            }
            Ok(())
        })
        .await?;

    if !reset_ids.is_empty() {
        info!(count = reset_ids.len(), "Recovery reset abandoned transitions");
    }
    Ok(reset_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::locking::{LockConfig, LockManager};
    use crate::domain::registry::{InstalledPlugin, PluginDescriptor};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_store() -> (RegistryStore, TempDir) {
        let temp = TempDir::new().unwrap();
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
        .unwrap();
        (store, temp)
    }

    async fn seed(store: &RegistryStore, id: &str, state: PluginState, owner: &str) {
        store
            .write(LockScope::Lifecycle, "seed", |reg| {
                reg.insert(
                    id.to_string(),
                    InstalledPlugin::new(
                        PluginDescriptor::new(id),
                        PluginStatus::new(state, owner),
                    ),
                );
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_foreign_busy_entries_are_reset() {
        let (store, _temp) = create_test_store();
        seed(&store, "stuck-install", PluginState::Installing, "dead").await;
        seed(&store, "stuck-uninstall", PluginState::Uninstalling, "dead").await;

        let reset = reset_abandoned(&store, "alive").await.unwrap();
        assert_eq!(reset.len(), 2);

        let registry = store.read().unwrap();
        for id in ["stuck-install", "stuck-uninstall"] {
            assert_eq!(registry[id].status.state, PluginState::Installed);
            assert_eq!(registry[id].status.owner_instance_id, "alive");
            assert!(registry[id].status.msg.as_ref().unwrap().contains("reset"));
        }
    }

    #[tokio::test]
    async fn test_settled_and_own_entries_are_untouched() {
        let (store, _temp) = create_test_store();
        seed(&store, "ok", PluginState::Installed, "dead").await;
        seed(&store, "failed", PluginState::InstallFailed, "dead").await;
        seed(&store, "mine", PluginState::Installing, "alive").await;

        let reset = reset_abandoned(&store, "alive").await.unwrap();
        assert!(reset.is_empty());

        let registry = store.read().unwrap();
        assert_eq!(registry["ok"].status.state, PluginState::Installed);
        assert_eq!(registry["failed"].status.state, PluginState::InstallFailed);
        assert_eq!(registry["mine"].status.state, PluginState::Installing);
    }

    #[tokio::test]
    async fn test_empty_registry_is_fine() {
        let (store, _temp) = create_test_store();
        let reset = reset_abandoned(&store, "alive").await.unwrap();
        assert!(reset.is_empty());
    }
}
