//! Application state management

use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::storage::ModelStore;

/// Shared application state
pub struct AppState {
    /// Uploaded model storage
    pub store: ModelStore,
    /// Configuration
    pub config: Config,
}

impl AppState {
    /// Create new application state
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        let store = ModelStore::open(&config.storage.upload_dir, config.storage.unique_names).await?;
        Ok(Arc::new(Self { store, config }))
    }
}
