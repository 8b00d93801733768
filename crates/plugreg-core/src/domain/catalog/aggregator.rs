//! Merges every configured source into one view of the known plugins

use super::source::{CatalogSource, SourceStore};
use crate::domain::registry::{PluginDescriptor, RegistryStore, SourceKind, SourceRef};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Catalog document file name inside a file source directory
const REPO_FILE: &str = "repo.json";

/// Result of an aggregation pass
///
/// Aggregation never aborts on a bad source; `failures` carries one error
/// per source that could not be loaded.
#[derive(Debug, Default)]
pub struct Aggregation {
    /// Known plugins keyed by id
    pub plugins: BTreeMap<String, PluginDescriptor>,

    /// Per-source failures from this pass
    pub failures: Vec<Error>,
}

/// Aggregates plugin descriptors from all configured sources
#[derive(Debug, Clone)]
pub struct CatalogAggregator {
    sources: SourceStore,
    store: RegistryStore,
    http: reqwest::Client,
}

impl CatalogAggregator {
    /// Create an aggregator over the given source list and registry
    pub fn new(sources: SourceStore, store: RegistryStore) -> Self {
        Self {
            sources,
            store,
            http: reqwest::Client::new(),
        }
    }

    /// Get the source store
    pub fn sources(&self) -> &SourceStore {
        &self.sources
    }

    /// Merge every source's catalog, in declared order, last source wins
    pub async fn aggregate(&self) -> Result<Aggregation> {
        let mut outcome = Aggregation::default();

        for source in self.sources.load()? {
            match self.fetch(&source).await {
                Ok(descriptors) => {
                    debug!(source = %source.id, count = descriptors.len(), "Source aggregated");
                    for mut descriptor in descriptors {
                        descriptor.source = Some(SourceRef {
                            id: source.id.clone(),
                            kind: source.kind,
                            location: source.location.clone(),
                        });
                        outcome.plugins.insert(descriptor.id.clone(), descriptor);
                    }
                }
                Err(e) => {
                    warn!(source = %source.id, error = %e, "Skipping failed source");
                    outcome.failures.push(e);
                }
            }
        }

        Ok(outcome)
    }

    /// Every known plugin: aggregated catalogs overlaid with the installed
    /// registry, installed entries winning
    pub async fn all_known(&self) -> Result<Aggregation> {
        let mut outcome = self.aggregate().await?;
        for (id, entry) in self.store.read()? {
            outcome.plugins.insert(id, entry.descriptor);
        }
        Ok(outcome)
    }

    /// Known plugins that are not installed
    pub async fn available(&self) -> Result<Aggregation> {
        let mut outcome = self.aggregate().await?;
        let installed = self.store.read()?;
        outcome.plugins.retain(|id, _| !installed.contains_key(id));
        Ok(outcome)
    }

    /// Fetch one source's catalog document
    async fn fetch(&self, source: &CatalogSource) -> Result<Vec<PluginDescriptor>> {
        match source.kind {
            SourceKind::File => self.fetch_file(source),
            SourceKind::Url => self.fetch_url(source).await,
            // Named sources carry a bare package spec; no catalog document
            SourceKind::Named => Ok(Vec::new()),
        }
    }

    fn fetch_file(&self, source: &CatalogSource) -> Result<Vec<PluginDescriptor>> {
        let path = Path::new(&source.location).join(REPO_FILE);
        let contents = std::fs::read_to_string(&path).map_err(|e| Error::CatalogSource {
            source_id: source.id.clone(),
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;

        serde_json::from_str(&contents).map_err(|e| Error::CatalogSource {
            source_id: source.id.clone(),
            reason: format!("cannot parse {}: {}", path.display(), e),
        })
    }

    async fn fetch_url(&self, source: &CatalogSource) -> Result<Vec<PluginDescriptor>> {
        let response = self
            .http
            .get(&source.location)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::CatalogSource {
                source_id: source.id.clone(),
                reason: e.to_string(),
            })?;

        response.json().await.map_err(|e| Error::CatalogSource {
            source_id: source.id.clone(),
            reason: format!("invalid catalog document: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::locking::{LockConfig, LockManager, LockScope};
    use crate::domain::registry::{InstalledPlugin, PluginState, PluginStatus};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_repo(dir: &Path, plugins: serde_json::Value) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(REPO_FILE), plugins.to_string()).unwrap();
    }

    fn create_test_aggregator(temp: &TempDir, sources: Vec<CatalogSource>) -> CatalogAggregator {
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
        let source_store = SourceStore::new(temp.path().join("sources.json"), sources);
        CatalogAggregator::new(source_store, store)
    }

    #[tokio::test]
    async fn test_file_source_aggregation_attaches_source_ref() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("builtin");
        write_repo(&dir, json!([{"id": "alpha"}, {"id": "beta", "name": "Beta"}]));

        let aggregator =
            create_test_aggregator(&temp, vec![CatalogSource::file("builtin", &dir)]);
        let outcome = aggregator.aggregate().await.unwrap();

        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.plugins.len(), 2);
        let alpha = &outcome.plugins["alpha"];
        let source = alpha.source.as_ref().unwrap();
        assert_eq!(source.id, "builtin");
        assert_eq!(source.kind, SourceKind::File);
    }

    #[tokio::test]
    async fn test_later_source_wins_id_collisions() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        write_repo(&first, json!([{"id": "alpha", "name": "Old"}]));
        write_repo(&second, json!([{"id": "alpha", "name": "New"}]));

        let aggregator = create_test_aggregator(
            &temp,
            vec![
                CatalogSource::file("first", &first),
                CatalogSource::file("second", &second),
            ],
        );
        let outcome = aggregator.aggregate().await.unwrap();

        assert_eq!(outcome.plugins.len(), 1);
        assert_eq!(outcome.plugins["alpha"].name.as_deref(), Some("New"));
        assert_eq!(outcome.plugins["alpha"].source.as_ref().unwrap().id, "second");
    }

    #[tokio::test]
    async fn test_bad_source_is_skipped_and_recorded() {
        let temp = TempDir::new().unwrap();
        let good = temp.path().join("good");
        write_repo(&good, json!([{"id": "alpha"}]));

        let aggregator = create_test_aggregator(
            &temp,
            vec![
                CatalogSource::file("missing", temp.path().join("nowhere")),
                CatalogSource::file("good", &good),
            ],
        );
        let outcome = aggregator.aggregate().await.unwrap();

        assert_eq!(outcome.plugins.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(outcome.failures[0], Error::CatalogSource { .. }));
    }

    /// Minimal HTTP responder serving one fixed response on a local port
    async fn spawn_http(status_line: &str, body: &str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let response = response.clone();
                tokio::spawn(async move {
                    use tokio::io::{AsyncReadExt, AsyncWriteExt};
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_url_source_fetched_over_http() {
        let temp = TempDir::new().unwrap();
        let url = spawn_http(
            "200 OK",
            &json!([{"id": "alpha", "name": "Alpha"}]).to_string(),
        )
        .await;

        let aggregator = create_test_aggregator(&temp, vec![CatalogSource::url("market", url)]);
        let outcome = aggregator.aggregate().await.unwrap();

        assert!(outcome.failures.is_empty());
        let alpha = &outcome.plugins["alpha"];
        assert_eq!(alpha.name.as_deref(), Some("Alpha"));
        let source = alpha.source.as_ref().unwrap();
        assert_eq!(source.id, "market");
        assert_eq!(source.kind, SourceKind::Url);
    }

    #[tokio::test]
    async fn test_failing_url_source_is_recorded_and_others_still_aggregate() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("builtin");
        write_repo(&dir, json!([{"id": "beta"}]));
        let bad_url = spawn_http("500 Internal Server Error", "boom").await;

        let aggregator = create_test_aggregator(
            &temp,
            vec![
                CatalogSource::url("broken", bad_url),
                CatalogSource::file("builtin", &dir),
            ],
        );
        let outcome = aggregator.aggregate().await.unwrap();

        assert_eq!(outcome.plugins.len(), 1);
        assert!(outcome.plugins.contains_key("beta"));
        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(outcome.failures[0], Error::CatalogSource { .. }));
    }

    #[tokio::test]
    async fn test_url_source_with_invalid_document_is_recorded() {
        let temp = TempDir::new().unwrap();
        let url = spawn_http("200 OK", "this is not json").await;

        let aggregator = create_test_aggregator(&temp, vec![CatalogSource::url("market", url)]);
        let outcome = aggregator.aggregate().await.unwrap();

        assert!(outcome.plugins.is_empty());
        assert_eq!(outcome.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_all_known_prefers_installed_and_available_excludes_them() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("builtin");
        write_repo(
            &dir,
            json!([{"id": "alpha", "name": "Catalog"}, {"id": "beta"}]),
        );

        let aggregator =
            create_test_aggregator(&temp, vec![CatalogSource::file("builtin", &dir)]);

        // Install alpha with a different name than the catalog's
        let mut descriptor = PluginDescriptor::new("alpha");
        descriptor.name = Some("Installed".to_string());
        aggregator
            .store
            .write(LockScope::Lifecycle, "test", |reg| {
                reg.insert(
                    "alpha".to_string(),
                    InstalledPlugin::new(
                        descriptor,
                        PluginStatus::new(PluginState::Installed, "test"),
                    ),
                );
                Ok(())
            })
            .await
            .unwrap();

        let known = aggregator.all_known().await.unwrap();
        assert_eq!(known.plugins.len(), 2);
        assert_eq!(known.plugins["alpha"].name.as_deref(), Some("Installed"));

        let available = aggregator.available().await.unwrap();
        assert_eq!(available.plugins.len(), 1);
        assert!(available.plugins.contains_key("beta"));
    }
}
