//! Air-raid alert relay bot.
//!
//! Watches the alert provider on behalf of Signal subscribers and relays
//! alert changes to them. Also serves a small HTTP status API.

mod config;
mod listener;
mod logging;
mod notifier;
mod server;

use std::sync::Arc;
use std::time::Duration;

use alert_feed::{AlertApiClient, FeedConfig};
use alert_watch::{StateCache, SubscriptionController, WatchConfig};
use secrecy::ExposeSecret;
use signal_daemon::{DaemonConfig, SignalClient};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::BotConfig;
use crate::listener::CommandListener;
use crate::notifier::SignalNotifier;
use crate::server::AppState;

const DAEMON_HEALTH_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let config = BotConfig::from_env()?;
    logging::init(config.environment);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        "Starting air-raid bot"
    );

    let feed = AlertApiClient::new(FeedConfig::new(
        &config.api_url,
        config.api_key.expose_secret(),
    ))?;

    let daemon_config =
        DaemonConfig::with_account(&config.signal_daemon_url, &config.signal_account);
    info!("Connecting to signal-cli daemon at {}", daemon_config.base_url);
    let client = SignalClient::connect(daemon_config).await?;
    let health_monitor = client.start_health_monitor(DAEMON_HEALTH_INTERVAL);

    let mut watch_config = WatchConfig::default().with_poll_interval(config.poll_interval);
    match config.stickers.clone() {
        Some(stickers) => watch_config = watch_config.with_stickers(stickers),
        None => info!("No stickers configured, single-region flips are sent as text"),
    }
    let controller = SubscriptionController::new(
        Arc::new(feed),
        Arc::new(SignalNotifier::new(client.clone())),
        StateCache::new(),
        watch_config,
    );

    match controller.refresh().await {
        Ok(count) => info!(regions = count, "Initial states loaded"),
        Err(e) => warn!("Initial state fetch failed, starting with an empty cache: {}", e),
    }

    let shutdown = CancellationToken::new();

    let tcp = TcpListener::bind(config.addr).await?;
    let server = tokio::spawn(server::serve(
        tcp,
        AppState::new(controller.clone()),
        shutdown.clone(),
    ));

    let listener = CommandListener::new(
        controller.clone(),
        config.default_region,
        config.signal_account.clone(),
    );
    let listener = tokio::spawn(listener.run(client, shutdown.clone()));

    shutdown_signal().await;
    shutdown.cancel();

    controller.shutdown().await;
    health_monitor.abort();

    match listener.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Command listener failed: {}", e),
        Err(e) => error!("Command listener task panicked: {}", e),
    }
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Status server failed: {}", e),
        Err(e) => error!("Status server task panicked: {}", e),
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
