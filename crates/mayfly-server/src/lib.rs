//! Mayfly server wiring.
//!
//! Builds the repository from configuration, assembles the boot-file locator
//! chain, and runs the two network faces: the TFTP server boot firmware
//! talks to, and the HTTP server carrying the admin API plus the `/boot`
//! chainload endpoint. Both share one shutdown signal.

pub mod api;
pub mod config;
pub mod locator;

pub use config::Config;

use crate::locator::{BootScriptLocator, FirmwareLocator, LocatorChain, StaticDirLocator};
use anyhow::Context;
use mayfly_store::Repository;
use mayfly_tftp::TftpServer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared state handed to every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub repository: Repository,
}

/// Run the server until ctrl-c.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let repository = mayfly_store::create_repository(&config.db)
        .context("failed to construct the repository")?;

    let chain = build_locator_chain(&config, repository.clone()).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // TFTP face.
    let tftp_addr: SocketAddr = config
        .tftp
        .address
        .parse()
        .with_context(|| format!("invalid tftp address {:?}", config.tftp.address))?;
    let tftp = TftpServer::new(tftp_addr, Arc::new(chain))
        .with_timeout(Duration::from_secs(config.tftp.timeout));
    let tftp_task = tokio::spawn(async move {
        if let Err(err) = tftp.run(shutdown_rx).await {
            error!(error = %err, "TFTP server exited");
        }
    });

    // HTTP face.
    let http_addr: SocketAddr = config
        .http
        .address
        .parse()
        .with_context(|| format!("invalid http address {:?}", config.http.address))?;
    let app = api::router(AppState { repository })
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.http.request_timeout,
        )));
    let listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("failed to bind http address {http_addr}"))?;
    info!(addr = %http_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "failed to install ctrl-c handler");
            }
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("http server failed")?;

    let _ = tftp_task.await;
    Ok(())
}

/// Firmware blobs first, per-host boot scripts second, raw static files
/// last. Order matters: the earliest locator that recognizes a path wins.
async fn build_locator_chain(
    config: &Config,
    repository: Repository,
) -> anyhow::Result<LocatorChain> {
    let mut firmware = FirmwareLocator::new();
    if let Some(basedir) = &config.basedir {
        if tokio::fs::try_exists(basedir).await.unwrap_or(false) {
            firmware
                .load_dir(basedir)
                .await
                .with_context(|| format!("failed to load firmware from {}", basedir.display()))?;
        } else {
            warn!(basedir = %basedir.display(), "configured basedir does not exist");
        }
    }

    let mut chain = LocatorChain::new()
        .with(Arc::new(firmware))
        .with(Arc::new(BootScriptLocator::new(repository)));
    if let Some(basedir) = &config.basedir {
        chain = chain.with(Arc::new(StaticDirLocator::new(basedir)));
    }
    Ok(chain)
}
