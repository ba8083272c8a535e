use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::repository::{ConfigRepository, RepositoryError};

/// Which store holds the bracket tables and contribution settings.
///
/// `connection_string` means whatever the backend says it means: a file
/// path or `:memory:` for `sqlite`, nothing for `memory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub backend: String,
    pub connection_string: String,
}

impl DbConfig {
    /// Backend names are matched case-insensitively, so they are stored
    /// trimmed and lowercased.
    pub fn new(
        backend: &str,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            backend: backend.trim().to_lowercase(),
            connection_string: connection_string.into(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::new("sqlite", ":memory:")
    }
}

/// Opens a configuration store for one backend.
#[async_trait]
pub trait RepositoryFactory: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Backends that persist data run their migrations and seeds here.
    async fn create(&self, config: &DbConfig) -> Result<Box<dyn ConfigRepository>, RepositoryError>;
}

/// Backends the binaries can open, keyed by [`RepositoryFactory::backend_name`].
#[derive(Default)]
pub struct RepositoryRegistry {
    factories: HashMap<&'static str, Box<dyn RepositoryFactory>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A later factory with the same name wins.
    pub fn register(&mut self, factory: Box<dyn RepositoryFactory>) {
        self.factories.insert(factory.backend_name(), factory);
    }

    pub fn available_backends(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Opens the store named by `config.backend`.
    ///
    /// An unregistered backend is a [`RepositoryError::Configuration`] that
    /// lists what is registered; factory errors pass through.
    pub async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn ConfigRepository>, RepositoryError> {
        let backend = config.backend.trim().to_lowercase();
        let Some(factory) = self.factories.get(backend.as_str()) else {
            warn!(%backend, "no configuration store registered");
            return Err(RepositoryError::Configuration(format!(
                "unknown backend '{}'; registered backends: {}",
                config.backend,
                self.available_backends().join(", ")
            )));
        };

        debug!(%backend, "opening configuration store");
        factory.create(config).await
    }
}
