use std::path::Path;
use std::sync::Arc;

use crate::app::error::Result;
use crate::config::Config;
use crate::downloader::Downloader;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::poller::Reconciler;
use crate::store::{SqliteStore, Store};

/// Long-lived collaborators, built once from [`Config`] and shared by every
/// command.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub fetcher: Arc<dyn Fetcher + Send + Sync>,
    pub reconciler: Arc<Reconciler>,
    pub downloader: Downloader,
}

impl AppContext {
    /// Load config from `config_path` (or the default location) and open the
    /// database it names.
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load(config_path)?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let db_path = config.database_path()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = Arc::new(SqliteStore::new(&db_path)?);
        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::new(&config.http)?);
        Self::assemble(config, store, fetcher)
    }

    /// In-memory database with the given transport.
    pub fn in_memory(config: Config, fetcher: Arc<dyn Fetcher + Send + Sync>) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::assemble(config, store, fetcher)
    }

    /// Override `poller.workers`.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.poller.workers = workers;
        self.reconciler = Arc::new(self.build_reconciler());
        self
    }

    fn assemble(
        config: Config,
        store: Arc<SqliteStore>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
    ) -> Result<Self> {
        let downloader =
            Downloader::from_config(fetcher.clone(), &config.downloader, config.download_dir()?);
        let reconciler = Arc::new(
            Reconciler::new(fetcher.clone(), store.clone(), config.api.clone())
                .with_workers(config.poller.workers),
        );

        Ok(Self {
            config,
            store,
            fetcher,
            reconciler,
            downloader,
        })
    }

    fn build_reconciler(&self) -> Reconciler {
        let store: Arc<dyn Store + Send + Sync> = self.store.clone();
        Reconciler::new(self.fetcher.clone(), store, self.config.api.clone())
            .with_workers(self.config.poller.workers)
    }
}
