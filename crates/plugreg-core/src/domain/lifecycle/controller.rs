//! Lifecycle controller: drives the plugin state machine

use super::recovery;
use crate::config::Config;
use crate::domain::catalog::{CatalogAggregator, SourceStore};
use crate::domain::locking::{LockConfig, LockManager, LockScope};
use crate::domain::registry::{
    InstalledPlugin, InstalledRegistry, PluginDescriptor, PluginState, PluginStatus, RegistryStore,
};
use crate::error::{Error, Result};
use crate::infrastructure::{EntryPointEvent, EntryPointRegistry, PackageInstaller, PluginReloader};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Drives install/uninstall transitions and plugin loading
///
/// Every transition writes its busy state (stamped with this instance's
/// id) before the external side effect runs, and its terminal state
/// after, so a crash in between is detectable by the next instance.
/// External failures are recorded into the status record rather than
/// propagated; the operation then reports `Ok(false)`.
pub struct LifecycleController {
    store: RegistryStore,
    catalog: CatalogAggregator,
    installer: Arc<dyn PackageInstaller>,
    entry_points: Arc<EntryPointRegistry>,
    reloader: Option<Arc<dyn PluginReloader>>,
    instance_id: String,
}

impl LifecycleController {
    /// Create a controller, running recovery before any call is accepted
    pub async fn new(
        store: RegistryStore,
        catalog: CatalogAggregator,
        installer: Arc<dyn PackageInstaller>,
        entry_points: Arc<EntryPointRegistry>,
    ) -> Result<Self> {
        let instance_id = Uuid::new_v4().to_string();
        recovery::reset_abandoned(&store, &instance_id).await?;

        Ok(Self {
            store,
            catalog,
            installer,
            entry_points,
            reloader: None,
            instance_id,
        })
    }

    /// Wire a controller from configuration: registry, locks, and the
    /// default source list all live under the configured plugin root
    pub async fn from_config(
        config: &Config,
        installer: Arc<dyn PackageInstaller>,
        entry_points: Arc<EntryPointRegistry>,
    ) -> Result<Self> {
        let paths = |r: anyhow::Result<std::path::PathBuf>| {
            r.map_err(|e| Error::ConfigError(e.to_string()))
        };

        let locks = Arc::new(LockManager::new(
            LockConfig::default()
                .with_lock_dir(paths(config.lock_dir())?)
                .with_timeout(config.lock_timeout())
                .with_retry_interval(config.lock_retry_interval()),
        ));
        let store = RegistryStore::open(
            paths(config.registry_path())?,
            locks,
            config.lock_timeout(),
        )?;
        let sources = SourceStore::new(
            paths(config.sources_path())?,
            SourceStore::default_sources(&paths(config.builtin_dir())?, &paths(config.custom_dir())?),
        );
        let catalog = CatalogAggregator::new(sources, store.clone());

        Self::new(store, catalog, installer, entry_points).await
    }

    /// Attach a host-runtime reload capability
    pub fn with_reloader(mut self, reloader: Arc<dyn PluginReloader>) -> Self {
        self.reloader = Some(reloader);
        self
    }

    /// This process's instance id
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Install a plugin by id
    ///
    /// Only permitted for plugins not currently installed; the failed
    /// states may retry. Returns `Ok(true)` on success and `Ok(false)`
    /// when the external install failed and the plugin was parked in
    /// `INSTALL_FAILED`.
    pub async fn install_plugin(&self, plugin_id: &str) -> Result<bool> {
        let descriptor = self.resolve_descriptor(plugin_id).await?;

        // Guards and the transition into INSTALLING are one locked write
        let instance_id = self.instance_id.clone();
        self.store
            .write(LockScope::Lifecycle, &format!("install {plugin_id}"), |reg| {
                if let Some(entry) = reg.get(plugin_id) {
                    if entry.status.state.is_busy() {
                        return Err(Error::PluginBusy {
                            id: plugin_id.to_string(),
                            state: entry.status.state.to_string(),
                        });
                    }
                    if entry.status.state == PluginState::Installed {
                        return Err(Error::PluginInstalled(plugin_id.to_string()));
                    }
                }
                reg.insert(
                    plugin_id.to_string(),
                    InstalledPlugin::new(
                        descriptor.clone(),
                        PluginStatus::new(PluginState::Installing, instance_id),
                    ),
                );
                Ok(())
            })
            .await?;

        // External side effects run outside any registry lock
        let outcome = self.run_install_effects(&descriptor).await;

        match outcome {
            Ok(()) => {
                info!(plugin_id, "Plugin installed");
                self.finish(plugin_id, PluginState::Installed, None).await?;
                Ok(true)
            }
            Err(e) => {
                warn!(plugin_id, error = %e, "Plugin install failed");
                self.finish(plugin_id, PluginState::InstallFailed, Some(e.to_string()))
                    .await?;
                Ok(false)
            }
        }
    }

    /// Uninstall a plugin by id
    ///
    /// Allowed from any settled state, including the failed states.
    /// Returns `Ok(true)` when the entry was removed and `Ok(false)` when
    /// the external removal failed and the plugin was parked in
    /// `UNINSTALL_FAILED`.
    pub async fn uninstall_plugin(&self, plugin_id: &str) -> Result<bool> {
        let instance_id = self.instance_id.clone();
        let mut descriptor: Option<PluginDescriptor> = None;
        self.store
            .write(
                LockScope::Lifecycle,
                &format!("uninstall {plugin_id}"),
                |reg| {
                    let entry = reg
                        .get_mut(plugin_id)
                        .ok_or_else(|| Error::PluginNotFound(plugin_id.to_string()))?;
                    if entry.status.state.is_busy() {
                        return Err(Error::PluginBusy {
                            id: plugin_id.to_string(),
                            state: entry.status.state.to_string(),
                        });
                    }
                    descriptor = Some(entry.descriptor.clone());
                    entry.status = PluginStatus::new(PluginState::Uninstalling, instance_id);
                    Ok(())
                },
            )
            .await?;
        let descriptor = descriptor.ok_or_else(|| Error::PluginNotFound(plugin_id.to_string()))?;

        let outcome = self.run_uninstall_effects(&descriptor).await;

        match outcome {
            Ok(()) => {
                info!(plugin_id, "Plugin uninstalled");
                self.store
                    .write(
                        LockScope::Lifecycle,
                        &format!("uninstall {plugin_id}"),
                        |reg| {
                            reg.remove(plugin_id);
                            Ok(())
                        },
                    )
                    .await?;
                Ok(true)
            }
            Err(e) => {
                warn!(plugin_id, error = %e, "Plugin uninstall failed");
                self.finish(plugin_id, PluginState::UninstallFailed, Some(e.to_string()))
                    .await?;
                Ok(false)
            }
        }
    }

    /// Run the load entry point of every installed plugin
    ///
    /// Holds the lifecycle lock so no transition interleaves with the
    /// scan. A plugin whose load handler fails is logged and skipped; the
    /// rest still load. Returns the number of plugins loaded.
    pub async fn load_plugins(&self) -> Result<usize> {
        let _lock = self.store.lock(LockScope::Lifecycle, "load plugins").await?;
        let registry = self.store.read()?;

        let mut loaded = 0;
        for (id, entry) in &registry {
            if entry.status.state != PluginState::Installed {
                continue;
            }
            match self.entry_points.run(
                EntryPointEvent::Load,
                id,
                entry.descriptor.load_kwargs.as_ref(),
            ) {
                Ok(_) => {
                    info!(plugin_id = %id, "Plugin loaded");
                    loaded += 1;
                }
                Err(e) => {
                    warn!(plugin_id = %id, error = %e, "Plugin failed to load");
                }
            }
        }
        Ok(loaded)
    }

    /// Reload a plugin's module in the host runtime
    pub async fn reload_plugin(&self, plugin_id: &str) -> Result<()> {
        let registry = self.store.read()?;
        let entry = registry
            .get(plugin_id)
            .ok_or_else(|| Error::PluginNotFound(plugin_id.to_string()))?;

        let reloader = self
            .reloader
            .as_ref()
            .ok_or_else(|| Error::ConfigError("no plugin reloader configured".to_string()))?;
        reloader.reload(&entry.descriptor.module_name()).await
    }

    /// Overwrite a plugin's status record directly
    ///
    /// Uses the status lock scope, so it serializes against lifecycle
    /// writes without blocking behind a whole transition.
    pub async fn set_status(
        &self,
        plugin_id: &str,
        state: PluginState,
        msg: Option<String>,
    ) -> Result<()> {
        let instance_id = self.instance_id.clone();
        self.store
            .write(LockScope::Status, &format!("status {plugin_id}"), |reg| {
                let entry = reg
                    .get_mut(plugin_id)
                    .ok_or_else(|| Error::PluginNotFound(plugin_id.to_string()))?;
                let mut status = PluginStatus::new(state, instance_id);
                status.msg = msg;
                entry.status = status;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Current status of a plugin
    pub fn status(&self, plugin_id: &str) -> Result<PluginStatus> {
        let registry = self.store.read()?;
        registry
            .get(plugin_id)
            .map(|entry| entry.status.clone())
            .ok_or_else(|| Error::PluginNotFound(plugin_id.to_string()))
    }

    /// Snapshot of the installed registry
    pub fn installed(&self) -> Result<InstalledRegistry> {
        self.store.read()
    }

    /// The catalog view backing this controller
    pub fn catalog(&self) -> &CatalogAggregator {
        &self.catalog
    }

    /// Resolve the descriptor to install: a failed entry retries with its
    /// own descriptor, anything else comes from the aggregated catalog
    async fn resolve_descriptor(&self, plugin_id: &str) -> Result<PluginDescriptor> {
        let registry = self.store.read()?;
        if let Some(entry) = registry.get(plugin_id) {
            if entry.status.state.is_busy() {
                return Err(Error::PluginBusy {
                    id: plugin_id.to_string(),
                    state: entry.status.state.to_string(),
                });
            }
            if entry.status.state == PluginState::Installed {
                return Err(Error::PluginInstalled(plugin_id.to_string()));
            }
            return Ok(entry.descriptor.clone());
        }

        let outcome = self.catalog.aggregate().await?;
        outcome
            .plugins
            .get(plugin_id)
            .cloned()
            .ok_or_else(|| Error::PluginNotFound(plugin_id.to_string()))
    }

    async fn run_install_effects(&self, descriptor: &PluginDescriptor) -> Result<()> {
        self.installer.install(descriptor).await?;
        self.entry_points
            .run(EntryPointEvent::Install, &descriptor.id, None)?;
        Ok(())
    }

    async fn run_uninstall_effects(&self, descriptor: &PluginDescriptor) -> Result<()> {
        self.entry_points
            .run(EntryPointEvent::Uninstall, &descriptor.id, None)?;
        self.installer.remove(descriptor).await?;
        Ok(())
    }

    /// Write the terminal state of a transition
    async fn finish(&self, plugin_id: &str, state: PluginState, msg: Option<String>) -> Result<()> {
        let instance_id = self.instance_id.clone();
        self.store
            .write(LockScope::Lifecycle, &format!("finish {plugin_id}"), |reg| {
                if let Some(entry) = reg.get_mut(plugin_id) {
                    let mut status = PluginStatus::new(state, instance_id);
                    status.msg = msg;
                    entry.status = status;
                }
                Ok(())
            })
            .await?;
        Ok(())
    }
}
