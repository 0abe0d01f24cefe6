// src/lib.rs
use anyhow::{Context, Result};
use std::sync::Arc;

pub mod client;
pub mod config;
pub mod error;
pub mod forward;
pub mod management_api;
pub mod metrics;
pub mod resolver;
pub mod server;
pub mod store;
pub mod validate;

use store::{SqliteStore, UrlStore};

/// The redirector service: URL store, selection resolver, forwarder and HTTP server
pub struct Redirector {
    config: config::RedirectorConfig,
}

impl Redirector {
    /// Create a new Redirector with the provided configuration
    pub fn new(config: config::RedirectorConfig) -> Self {
        Redirector { config }
    }

    /// Connect the store, make sure the selection record exists and serve
    /// until CTRL+C. Any failure before the listener is up is returned.
    pub async fn start(&self) -> Result<()> {
        self.config.validate()?;

        if self.config.metrics.enabled {
            metrics::init_metrics(&self.config.metrics)?;
        }

        let store = SqliteStore::connect(&self.config.database_url)
            .await
            .with_context(|| format!("failed to open URL store '{}'", self.config.database_url))?;
        let selection = store
            .ensure_selection()
            .await
            .context("failed to initialize the selection record")?;
        tracing::info!(
            "URL store ready; selected URL id: {:?}",
            selection.selected_url_id()
        );

        let store: Arc<dyn UrlStore> = Arc::new(store);
        let forwarder = forward::Forwarder::new(self.config.mode);
        tracing::info!("Forwarding mode: {}", forwarder.mode());

        let routes = server::routes(server::AppState::new(store, forwarder));
        server::run(self.config.listen_addr()?, routes, server::shutdown_signal()).await?;

        Ok(())
    }
}

// Re-export types for easier usage
pub use config::{ForwardMode, RedirectorConfig};
pub use error::RedirectorError;
pub use store::{Selection, UrlListing, UrlRecord};
