use std::sync::Arc;

use anyhow::Result;
use log::{error, info};
use tokio::sync::watch;

use printdash::config::Config;
use printdash::monitor;
use printdash::notifier::Notifier;
use printdash::printer::PrinterClient;
use printdash::server::{self, AppState};

/// printdash - personal dashboard and proxy for workshop 3D printers.
///
/// Serves a basic-auth-gated web UI for one or more printers (webcam stream,
/// job status, print cancellation, workshop lights) and runs one background
/// monitor per printer that posts a Matrix message whenever the printer's job
/// state changes.
///
/// # Environment Variables
///
/// Required:
/// * `PRINTERS` - Comma-separated printer names (e.g. "ender-d,ender-c")
/// * `PRINTER_BASE_URL` - Base URL of the printer API host
/// * `PLUG_URL` - Base URL of the smart plug controlling the lights
/// * `AUTH_USERNAME` - Username half of the basic-auth pair
///
/// Optional (with defaults):
/// * `LISTEN_ADDR` - Listen address (default: "0.0.0.0:5000")
/// * `POLL_INTERVAL_SECS` - Monitor poll interval (default: "5")
/// * `MATRIX_HOMESERVER` - Matrix homeserver (default: "https://matrix.org")
/// * `SECRETS_DIR` - Directory with the secret files (default: "./secrets")
///
/// Secret files under `SECRETS_DIR` (all required): `http-password.txt`,
/// `{printer}-api-key.txt` per printer, `matrix-username.txt`,
/// `matrix-password.txt`, `matrix-room-id.txt`.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger to output to stdout, using RUST_LOG env var or info level by default
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stdout)
        .filter_level(
            std::env::var("RUST_LOG")
                .ok()
                .and_then(|level| level.parse().ok())
                .unwrap_or(log::LevelFilter::Info),
        )
        .init();

    let config = Config::load().expect(
        "Failed to load configuration. Please ensure the required environment variables and secret files are present.",
    );

    info!("printdash starting...");
    info!("Printer API base URL: {}", config.printer_base_url);
    info!(
        "Monitoring {} printer(s): {}",
        config.printers.len(),
        config
            .printers
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let config = Arc::new(config);
    let printer_client = Arc::new(PrinterClient::new(
        config.printer_base_url.clone(),
        &config.printers,
    )?);
    let notifier = Arc::new(Notifier::new(config.matrix.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    for printer in &config.printers {
        tokio::spawn(monitor::run_monitor(
            printer.name.clone(),
            Arc::clone(&printer_client),
            Arc::clone(&notifier),
            config.poll_interval,
            shutdown_rx.clone(),
        ));
    }

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let state = Arc::new(AppState::new(
        Arc::clone(&config),
        printer_client,
        notifier,
    ));
    server::serve(state, shutdown_rx).await
}
