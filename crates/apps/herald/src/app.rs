//! Herald application state
//!
//! Owns the loaded configuration and the relay client, and builds chat
//! engines backed by the on-disk read state.

use anyhow::{Context, Result};
use chat::storage::FileWatermarkStore;
use chat::{ApiError, ChatEngine, ClientConfig, ReadStateStore, RelayAuth, RelayClient};
use log::{info, warn};
use std::sync::Arc;

pub struct HeraldApp {
    config: ClientConfig,
    client: Arc<RelayClient>,
}

impl HeraldApp {
    /// Load configuration and any saved login
    pub fn new() -> Result<Self> {
        let config = ClientConfig::load().context("Failed to load configuration")?;
        let auth = RelayAuth::new()?;
        let client = Arc::new(RelayClient::from_config(&config, auth));
        info!("Using relay at {}", client.base_url());
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<RelayClient> {
        &self.client
    }

    pub fn relay(&self) -> &RelayClient {
        &self.client
    }

    /// Fail early with a helpful message when there is no token
    pub fn require_login(&self) -> Result<()> {
        anyhow::ensure!(
            self.client.is_authenticated(),
            "Not logged in. Run `herald login` first."
        );
        Ok(())
    }

    /// Engine with read state loaded from the config directory
    pub fn engine(&self) -> Result<ChatEngine> {
        let store = FileWatermarkStore::open_default()?;
        let mut engine = ChatEngine::new(&self.config, ReadStateStore::new(Box::new(store)));
        let loaded = engine.load_read_state();
        info!("Loaded {} read watermarks", loaded);
        Ok(engine)
    }

    /// Drop the stored token after the backend rejected it
    pub fn expire_session(&self) -> anyhow::Error {
        if let Err(e) = self.client.auth().logout() {
            warn!("Failed to clear stored token: {:#}", e);
        }
        anyhow::anyhow!("Session expired. Run `herald login` to sign in again.")
    }

    /// Convert a backend error, logging out on 401
    pub fn api_error(&self, error: ApiError) -> anyhow::Error {
        if error.is_unauthorized() {
            self.expire_session()
        } else {
            error.into()
        }
    }
}
