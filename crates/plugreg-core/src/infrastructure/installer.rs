//! Package installer invocation

use crate::config::InstallerConfig;
use crate::domain::registry::{PluginDescriptor, SourceKind};
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::{debug, info};

/// Installs and removes plugin packages
///
/// The lifecycle controller never shells out directly; it drives this
/// trait so embedders can substitute their own packaging mechanism.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Install the package for a plugin; returns captured output
    async fn install(&self, descriptor: &PluginDescriptor) -> Result<String>;

    /// Remove the package for a plugin; returns captured output
    async fn remove(&self, descriptor: &PluginDescriptor) -> Result<String>;
}

/// Installer that invokes a configured program (`pip` by default)
///
/// File-source plugins are installed editable from their local directory;
/// url-source plugins install from their location; anything else installs
/// by bare id.
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    config: InstallerConfig,
}

impl CommandInstaller {
    /// Create an installer from configuration
    pub fn new(config: InstallerConfig) -> Self {
        Self { config }
    }

    /// Resolve the install target for a descriptor
    fn install_args(&self, descriptor: &PluginDescriptor) -> Vec<String> {
        match descriptor.source.as_ref() {
            Some(source) if source.kind == SourceKind::File => {
                // Local plugins install editable so a dev checkout stays live
                let path = descriptor
                    .path
                    .clone()
                    .unwrap_or_else(|| source.location.clone());
                vec!["install".to_string(), "--editable".to_string(), path]
            }
            Some(source) if source.kind == SourceKind::Url => {
                let target = descriptor
                    .path
                    .clone()
                    .unwrap_or_else(|| source.location.clone());
                vec!["install".to_string(), target]
            }
            Some(source) if source.kind == SourceKind::Named => {
                vec!["install".to_string(), source.location.clone()]
            }
            _ => vec!["install".to_string(), descriptor.id.clone()],
        }
    }

    async fn run(&self, args: Vec<String>) -> Result<String> {
        let mut command = tokio::process::Command::new(&self.config.program);
        command.args(&self.config.extra_args).args(&args);

        let rendered = format!("{} {}", self.config.program, args.join(" "));
        debug!(command = %rendered, "Invoking installer");

        let output = command.output().await.map_err(|e| Error::ExternalCommand {
            command: rendered.clone(),
            detail: e.to_string(),
        })?;

        if output.status.success() {
            info!(command = %rendered, "Installer command succeeded");
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(Error::ExternalCommand {
                command: rendered,
                detail: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

#[async_trait]
impl PackageInstaller for CommandInstaller {
    async fn install(&self, descriptor: &PluginDescriptor) -> Result<String> {
        self.run(self.install_args(descriptor)).await
    }

    async fn remove(&self, descriptor: &PluginDescriptor) -> Result<String> {
        self.run(vec![
            "uninstall".to_string(),
            "-y".to_string(),
            descriptor.id.clone(),
        ])
        .await
    }
}
