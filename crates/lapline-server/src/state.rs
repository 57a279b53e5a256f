use std::sync::Arc;

use tokio::sync::RwLock;

use lapline_core::store::TournamentStore;

use crate::auth::AuthConfig;
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::persist::{DataFile, Snapshot};
use crate::scraper::MapFetcher;

pub type SharedStore = Arc<RwLock<TournamentStore>>;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub data: Arc<DataFile>,
    pub fetcher: Arc<dyn MapFetcher>,
    pub auth: AuthConfig,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig, store: TournamentStore, fetcher: Arc<dyn MapFetcher>) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            data: Arc::new(DataFile::new(&config.data_file)),
            fetcher,
            auth: AuthConfig {
                admin_token: config.auth.admin_token.clone(),
            },
            config: Arc::new(config),
        }
    }

    /// Write the current dataset to disk. Handlers call this after every
    /// mutation and surface the error, so a client never gets a success
    /// response for a change that was not persisted.
    pub async fn persist(&self) -> Result<(), AppError> {
        let snapshot = {
            let store = self.store.read().await;
            Snapshot::of(&store)
        };
        self.data.save(&snapshot).await.map_err(|e| {
            tracing::error!(path = %self.data.path().display(), "Failed to write data file: {e}");
            AppError::Internal("Failed to persist tournament data".to_string())
        })
    }
}
