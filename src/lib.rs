pub mod client;
pub mod core;
pub mod providers;
pub mod server;
pub mod service;
pub mod store;

use crate::core::config::{ServerConfig, StorageKind};
use crate::providers::awesome_api::AwesomeApiSource;
use crate::service::QuoteService;
use crate::store::{FjallQuoteStore, MemoryQuoteStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Runs the quote server until Ctrl-C.
///
/// The store is opened before the listener is bound: a store that cannot be
/// opened stops startup instead of failing requests later.
pub async fn run_server(config_path: Option<&str>) -> Result<()> {
    info!("bidwatch server starting...");

    let config = match config_path {
        Some(path) => ServerConfig::load_from_path(path)?,
        None => ServerConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let source = Arc::new(
        AwesomeApiSource::new(&config.upstream_url).context("Failed to build HTTP client")?,
    );

    match config.storage {
        StorageKind::Disk => {
            let data_path = config.data_path();
            let store = Arc::new(FjallQuoteStore::open(&data_path)?);
            info!(path = %data_path.display(), "Opened quote store");

            let listener = bind(&config.listen_addr).await?;
            server::serve(
                listener,
                QuoteService::new(source, store.clone()),
                shutdown_signal(),
            )
            .await?;
            store.flush()?;
        }
        StorageKind::Memory => {
            warn!("Using in-memory quote store, records are lost on exit");
            let store = Arc::new(MemoryQuoteStore::new());

            let listener = bind(&config.listen_addr).await?;
            server::serve(listener, QuoteService::new(source, store), shutdown_signal()).await?;
        }
    }

    info!("bidwatch server stopped");
    Ok(())
}

async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "Listening");
    Ok(listener)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
