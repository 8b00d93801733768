//! Plugreg Core Library
//!
//! This crate provides the core functionality for Plugreg, including:
//! - Plugin catalog aggregation from file and url sources
//! - Persistent installed-plugin registry with cross-process locking
//! - Lifecycle state machine (install, uninstall, load)
//! - Recovery of transitions abandoned by a dead process

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::catalog::{CatalogAggregator, CatalogSource, SourceStore};
    pub use crate::domain::lifecycle::LifecycleController;
    pub use crate::domain::registry::{
        InstalledPlugin, InstalledRegistry, PluginDescriptor, PluginState, PluginStatus,
        RegistryStore,
    };
    pub use crate::error::{Error, Result};
    pub use crate::infrastructure::{
        CommandInstaller, EntryPointEvent, EntryPointRegistry, PackageInstaller, PluginReloader,
    };
}
