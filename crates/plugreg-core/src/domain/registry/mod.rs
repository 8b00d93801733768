//! Persisted installed-plugin registry
//!
//! The registry is a single JSON document mapping plugin id to its
//! descriptor and status record. All mutation goes through
//! `RegistryStore::write`, which serializes writers with named
//! cross-process locks and persists atomically.

pub mod store;
pub mod types;

// Re-export main types
pub use store::RegistryStore;
pub use types::{
    InstalledPlugin, InstalledRegistry, PluginDescriptor, PluginState, PluginStatus, SourceKind,
    SourceRef,
};
