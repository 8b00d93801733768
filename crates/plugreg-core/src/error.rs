//! Error types for Plugreg

use thiserror::Error;

/// Result type alias using Plugreg's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Plugreg error types with helpful messages
#[derive(Error, Debug)]
pub enum Error {
    // Lock errors (E300-E399)
    #[error("Lock timeout: {0}. Another process holds the registry, try again later.")]
    LockTimeout(String),

    // Storage errors (E400-E499)
    #[error("Registry corrupted: {0}")]
    Corrupted(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Plugin errors (E500-E599)
    #[error("Plugin '{0}' not found in any configured source.")]
    PluginNotFound(String),

    #[error("Plugin '{id}' is busy ({state}); wait for the current transition to finish.")]
    PluginBusy { id: String, state: String },

    #[error("Plugin '{0}' is already installed.")]
    PluginInstalled(String),

    #[error("External command '{command}' failed: {detail}")]
    ExternalCommand { command: String, detail: String },

    // `source` is reserved by the error derive, hence `source_id`
    #[error("Catalog source '{source_id}' failed: {reason}")]
    CatalogSource { source_id: String, reason: String },

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::LockTimeout(_) => "E300",
            Self::Corrupted(_) => "E400",
            Self::Json(_) => "E401",
            Self::PluginNotFound(_) => "E500",
            Self::PluginBusy { .. } => "E501",
            Self::PluginInstalled(_) => "E502",
            Self::ExternalCommand { .. } => "E510",
            Self::CatalogSource { .. } => "E520",
            Self::ConfigError(_) => "E600",
            Self::Other(_) => "E700",
            Self::Io(_) => "E701",
        }
    }
}

impl From<crate::domain::locking::LockError> for Error {
    fn from(err: crate::domain::locking::LockError) -> Self {
        use crate::domain::locking::LockError;
        match err {
            LockError::Timeout { .. } => Self::LockTimeout(err.to_string()),
            LockError::Corrupted(msg) => Self::Corrupted(msg),
            other => Self::Other(other.to_string()),
        }
    }
}
