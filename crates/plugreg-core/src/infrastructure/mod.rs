//! Infrastructure layer
//!
//! Adapters for the external systems the lifecycle drives: the package
//! installer and the plugin entry-point/reload mechanisms.

pub mod entrypoints;
pub mod installer;

// Re-export main types
pub use entrypoints::{EntryPointEvent, EntryPointFn, EntryPointRegistry, PluginReloader};
pub use installer::{CommandInstaller, PackageInstaller};
