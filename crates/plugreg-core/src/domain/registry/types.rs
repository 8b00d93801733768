//! Registry data model: plugin descriptors, states, and status records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The persisted registry: plugin id to installed record
pub type InstalledRegistry = BTreeMap<String, InstalledPlugin>;

/// Lifecycle state of an installed plugin
///
/// Available plugins (known from a catalog but not installed) have no
/// persisted state; absence from the registry means available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginState {
    /// Install transition in progress
    Installing,
    /// Installed and usable
    Installed,
    /// Install transition failed
    InstallFailed,
    /// Uninstall transition in progress
    Uninstalling,
    /// Uninstall transition failed; the entry remains for retry
    UninstallFailed,
}

impl PluginState {
    /// Busy states reject new transitions until resolved
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Installing | Self::Uninstalling)
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installing => "INSTALLING",
            Self::Installed => "INSTALLED",
            Self::InstallFailed => "INSTALL_FAILED",
            Self::Uninstalling => "UNINSTALLING",
            Self::UninstallFailed => "UNINSTALL_FAILED",
        }
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mutable status record persisted with each installed plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginStatus {
    /// Current lifecycle state
    pub state: PluginState,

    /// When the state was last written
    pub timestamp: DateTime<Utc>,

    /// Diagnostic message; set on failure states
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,

    /// Instance id of the process that last wrote this record
    pub owner_instance_id: String,
}

impl PluginStatus {
    /// Create a status record stamped with the writing instance
    pub fn new(state: PluginState, owner_instance_id: impl Into<String>) -> Self {
        Self {
            state,
            timestamp: Utc::now(),
            msg: None,
            owner_instance_id: owner_instance_id.into(),
        }
    }

    /// Attach a diagnostic message
    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }
}

/// Kind of source a plugin came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Local directory carrying a catalog document
    File,
    /// Remote catalog fetched over HTTP
    Url,
    /// Bare package spec passed straight to the installer
    Named,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Url => "url",
            Self::Named => "named",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference to the source a descriptor was aggregated from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source id from the source list
    pub id: String,
    /// Source kind
    pub kind: SourceKind,
    /// Directory path, url, or package spec depending on kind
    pub location: String,
}

/// Identity and install metadata for a plugin
///
/// Catalog records are open-schema; fields this crate does not interpret
/// are preserved in `extra` and round-tripped unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Unique plugin id; doubles as the package name
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Per-plugin install location override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Keyword arguments forwarded to the plugin's load entry point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_kwargs: Option<serde_json::Map<String, serde_json::Value>>,

    /// Attached during aggregation; identifies where this plugin came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceRef>,

    /// Unrecognized catalog fields, preserved verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PluginDescriptor {
    /// Create a minimal descriptor for the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            path: None,
            load_kwargs: None,
            source: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Host-runtime module name for this plugin
    pub fn module_name(&self) -> String {
        self.id.replace('-', "_")
    }
}

/// An installed plugin: its descriptor plus the persisted status record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledPlugin {
    #[serde(flatten)]
    pub descriptor: PluginDescriptor,

    pub status: PluginStatus,
}

impl InstalledPlugin {
    /// Create an installed record from a descriptor and status
    pub fn new(descriptor: PluginDescriptor, status: PluginStatus) -> Self {
        Self { descriptor, status }
    }
}
