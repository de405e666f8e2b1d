//! Node bootstrap

use crate::common::{Config, NodeRole, Result};
use crate::proxy::ReplicaProxy;
use crate::rpc::HttpChannel;
use crate::server::http::{create_router, AppState};
use crate::store::{LocalStore, LogOptions, Store};
use std::num::NonZeroUsize;
use std::sync::Arc;

pub struct Node {
    config: Config,
}

impl Node {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Master: durable local store (fails if the log cannot be opened).
    /// Proxy: cache in front of `master_addr`.
    pub fn build_store(&self) -> Result<Arc<dyn Store>> {
        match &self.config.master_addr {
            Some(master) => {
                let channel = HttpChannel::new(master, self.config.rpc_timeout())?;
                let capacity = self.config.cache_capacity.and_then(NonZeroUsize::new);
                Ok(Arc::new(ReplicaProxy::new(channel, capacity)))
            }
            None => {
                let options = LogOptions {
                    sync_policy: self.config.sync_policy,
                    queue_capacity: self.config.log_queue_capacity,
                };
                Ok(Arc::new(LocalStore::open(&self.config.data_file, options)?))
            }
        }
    }

    pub async fn serve(self) -> Result<()> {
        let role = self.config.role();
        tracing::info!("Starting {} node", role);
        tracing::info!("  HTTP: {}", self.config.http_addr);
        tracing::info!("  Host: {}", self.config.hostname);
        tracing::info!("  RPC: {}", if self.config.rpc_enabled { "enabled" } else { "disabled" });
        match role {
            NodeRole::Master => {
                tracing::info!("  Log: {}", self.config.data_file.display());
                tracing::info!("  Sync: {:?}", self.config.sync_policy);
            }
            NodeRole::Proxy => {
                tracing::info!("  Master: {}", self.config.master_addr.as_deref().unwrap_or_default());
                match self.config.cache_capacity {
                    Some(capacity) => tracing::info!("  Cache: {} entries", capacity),
                    None => tracing::info!("  Cache: unbounded"),
                }
            }
        }

        let store = self.build_store()?;
        let router = create_router(
            AppState {
                store: store.clone(),
                hostname: self.config.hostname.clone(),
            },
            self.config.rpc_enabled,
        );

        let listener = tokio::net::TcpListener::bind(self.config.http_addr).await?;
        tracing::info!("✓ Node ready ({} entries)", store.count());

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Shutting down");
        store.flush().await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
