//! Plugin entry points and host-runtime reload
//!
//! Entry points are explicit registrations: the embedding application
//! wires `(event, plugin id)` pairs to handler callables, and the
//! lifecycle invokes whatever is registered. A plugin with no handler for
//! an event is not an error.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Lifecycle events a plugin can handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPointEvent {
    /// After the plugin's package is installed
    Install,
    /// Before the plugin's package is removed
    Uninstall,
    /// When installed plugins are loaded at startup
    Load,
}

impl EntryPointEvent {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Load => "load",
        }
    }
}

impl fmt::Display for EntryPointEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered entry-point handler
pub type EntryPointFn = Arc<dyn Fn(Option<&Map<String, Value>>) -> Result<Value> + Send + Sync>;

/// Registry of entry-point handlers keyed by event and plugin id
#[derive(Default)]
pub struct EntryPointRegistry {
    handlers: RwLock<HashMap<(EntryPointEvent, String), Vec<(String, EntryPointFn)>>>,
}

impl EntryPointRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named handler for an event on a plugin
    pub fn register<F>(&self, event: EntryPointEvent, plugin_id: &str, name: &str, handler: F)
    where
        F: Fn(Option<&Map<String, Value>>) -> Result<Value> + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers
            .entry((event, plugin_id.to_string()))
            .or_default()
            .push((name.to_string(), Arc::new(handler)));
    }

    /// Invoke every handler registered for the event on the plugin
    ///
    /// Returns handler name to return value. No registered handler yields
    /// an empty map. The first handler error aborts the run.
    pub fn run(
        &self,
        event: EntryPointEvent,
        plugin_id: &str,
        kwargs: Option<&Map<String, Value>>,
    ) -> Result<BTreeMap<String, Value>> {
        let matching: Vec<(String, EntryPointFn)> = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers
                .get(&(event, plugin_id.to_string()))
                .cloned()
                .unwrap_or_default()
        };

        debug!(event = %event, plugin_id, handlers = matching.len(), "Running entry points");

        let mut results = BTreeMap::new();
        for (name, handler) in matching {
            let value = handler(kwargs)?;
            results.insert(name, value);
        }
        Ok(results)
    }
}

impl fmt::Debug for EntryPointRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("EntryPointRegistry")
            .field("registrations", &handlers.len())
            .finish()
    }
}

/// Host-runtime module reload capability
///
/// Reloading a live plugin module is the embedder's business; the core
/// only validates the plugin and delegates.
#[async_trait]
pub trait PluginReloader: Send + Sync {
    /// Reload the named module
    async fn reload(&self, module_name: &str) -> Result<()>;
}
