//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Plugreg configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub registry: RegistryConfig,
    pub installer: InstallerConfig,
    pub locking: LockingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Plugin category; names the subdirectory everything lives under
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerConfig {
    /// Program invoked to install and remove plugin packages
    pub program: String,
    /// Extra arguments prepended to every invocation
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockingConfig {
    pub timeout_secs: u64,
    pub retry_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry: RegistryConfig {
                category: "plugins".to_string(),
            },
            installer: InstallerConfig {
                program: "pip".to_string(),
                extra_args: Vec::new(),
            },
            locking: LockingConfig {
                timeout_secs: 30,
                retry_interval_ms: 100,
            },
        }
    }
}

impl Config {
    /// Get the root directory path
    pub fn root_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("PLUGREG_ROOT") {
            PathBuf::from(custom_dir)
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow!("Could not determine home directory"))?
                .join(".plugreg")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::root_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            // Return default config without creating file
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::root_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create root directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.registry.category.trim().is_empty() {
            return Err(anyhow!("registry.category must not be empty"));
        }
        if self.installer.program.trim().is_empty() {
            return Err(anyhow!("installer.program must not be empty"));
        }
        if self.locking.timeout_secs == 0 {
            return Err(anyhow!("locking.timeout_secs must be greater than zero"));
        }
        Ok(())
    }

    /// Directory holding all state for this plugin category
    pub fn plugin_root(&self) -> anyhow::Result<PathBuf> {
        Ok(Self::root_dir()?.join(&self.registry.category))
    }

    /// Path of the installed-plugin registry document
    pub fn registry_path(&self) -> anyhow::Result<PathBuf> {
        Ok(self.plugin_root()?.join("installed.json"))
    }

    /// Path of the plugin source list
    pub fn sources_path(&self) -> anyhow::Result<PathBuf> {
        Ok(self.plugin_root()?.join("sources.json"))
    }

    /// Directory for registry lock files
    pub fn lock_dir(&self) -> anyhow::Result<PathBuf> {
        Ok(self.plugin_root()?.join("locks"))
    }

    /// Directory the default builtin source points at
    pub fn builtin_dir(&self) -> anyhow::Result<PathBuf> {
        Ok(self.plugin_root()?.join("builtin"))
    }

    /// Directory the default custom source points at
    pub fn custom_dir(&self) -> anyhow::Result<PathBuf> {
        Ok(self.plugin_root()?.join("custom"))
    }

    /// Bounded wait for registry locks
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.locking.timeout_secs)
    }

    /// Poll interval while waiting for a contended lock
    pub fn lock_retry_interval(&self) -> Duration {
        Duration::from_millis(self.locking.retry_interval_ms)
    }
}
