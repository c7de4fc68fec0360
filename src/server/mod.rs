// src/server/mod.rs
//! SatisPress HTTP server
//!
//! This module provides an HTTP server that:
//! - Serves `packages.json` for Composer clients, filtered per user
//! - Serves release artifacts, archiving them on first request
//! - Authenticates clients with HTTP Basic auth (API key as user name)
//!
//! The core is synchronous; handlers run it on the blocking pool.

mod cache;
mod handlers;
mod routes;

pub use cache::IndexCache;
pub use routes::create_router;

use crate::app::App;
use crate::auth::{ApiKeyRegistry, User};
use crate::config::SatispressConfig;
use crate::error::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
    /// Lifetime of a rendered packages.json
    pub index_ttl: Duration,
    /// Archive installed releases in the background at startup
    pub archive_on_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            index_ttl: Duration::from_secs(12 * 60 * 60),
            archive_on_start: false,
        }
    }
}

/// Shared server state
pub struct ServerState {
    pub config: ServerConfig,
    pub app: App,
    pub api_keys: ApiKeyRegistry,
    pub index_cache: Arc<IndexCache>,
}

impl ServerState {
    /// Build the state and every service behind it
    ///
    /// Must be called outside the async runtime.
    pub fn from_config(config: &SatispressConfig) -> anyhow::Result<Self> {
        let server = config.to_server_config()?;
        let index_cache = Arc::new(IndexCache::new(server.index_ttl));
        let app = App::from_config(config, vec![index_cache.clone()])?;

        Ok(Self {
            config: server,
            app,
            api_keys: ApiKeyRegistry::new(&config.auth.api_keys),
            index_cache,
        })
    }

    /// Serialized packages.json for a user, served from cache when fresh
    pub fn render_index(&self, user: &User) -> Result<Arc<String>> {
        if let Some(body) = self.index_cache.get(&user.name) {
            return Ok(body);
        }

        let index = self.app.index(user)?;
        let body = serde_json::to_string(&index)?;
        info!(
            user = %user.name,
            packages = index.packages.len(),
            "Rendered packages.json"
        );
        Ok(self.index_cache.insert(&user.name, body))
    }
}

/// Start the server
pub async fn run_server(state: Arc<ServerState>) -> anyhow::Result<()> {
    info!("Starting SatisPress server on {}", state.config.bind_addr);
    info!("Public URL: {}", state.app.public_url);
    info!("Index TTL: {:?}", state.config.index_ttl);

    if state.api_keys.is_empty() {
        warn!("No API keys configured, every request will be rejected");
    }

    if state.config.archive_on_start {
        let archive_state = state.clone();
        tokio::task::spawn_blocking(move || {
            match archive_state.app.package_archiver().archive_installed() {
                Ok(report) if !report.is_success() => {
                    warn!("{} releases failed to archive at startup", report.failed.len());
                }
                Ok(_) => {}
                Err(e) => error!("Startup archiving failed: {}", e),
            }
        });
    }

    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(state.config.bind_addr).await?;
    info!("SatisPress is ready to serve");

    axum::serve(listener, app).await?;
    Ok(())
}
