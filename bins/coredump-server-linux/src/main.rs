//! Crash-dump server for Linux.
//!
//! Serves a raw partition image (for example one read back with
//! `esptool.py read_flash`) through the same handlers the device uses, so
//! the download path can be exercised without hardware.
//!
//! ```text
//! coredump-server core.img
//! curl -OJ http://localhost:8080/download
//! ```
//!
//! Environment:
//! - `COREDUMP_IMAGE`  - image path, if not given as the first argument
//! - `COREDUMP_CONFIG` - optional settings JSON
//! - `COREDUMP_BIND`   - listen address (default `0.0.0.0:8080`)
//! - `RUST_LOG`        - tracing filter

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Context};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coredump_core::{AbortFault, Endpoint, FileRegions, Settings};
use coredump_web::{create_router, ServerState};

const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,coredump_core=debug,coredump_web=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Core dump server starting...");

    // Configuration
    let settings = load_settings()?;
    let image = image_path()?;
    let addr: SocketAddr = std::env::var("COREDUMP_BIND")
        .unwrap_or_else(|_| DEFAULT_BIND.into())
        .parse()
        .context("Invalid COREDUMP_BIND address")?;

    if !image.is_file() {
        bail!("Image file not found: {}", image.display());
    }
    tracing::info!(
        "Serving {} as region {}",
        image.display(),
        settings.dump.region
    );

    let regions = FileRegions::new().with(settings.dump.region.clone(), image);
    let state = ServerState::new(regions, settings.dump, AbortFault);
    let app = create_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on {}", addr);
    for endpoint in Endpoint::ALL {
        tracing::info!("   GET http://localhost:{}{}", addr.port(), endpoint.path());
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down...");
            }
        })
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Settings from `COREDUMP_CONFIG`, or the defaults.
fn load_settings() -> anyhow::Result<Settings> {
    match std::env::var("COREDUMP_CONFIG") {
        Ok(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path))?;
            Ok(Settings::from_json(&text)?)
        }
        Err(_) => Ok(Settings::default()),
    }
}

fn image_path() -> anyhow::Result<PathBuf> {
    if let Some(arg) = std::env::args_os().nth(1) {
        return Ok(PathBuf::from(arg));
    }
    match std::env::var_os("COREDUMP_IMAGE") {
        Some(path) => Ok(PathBuf::from(path)),
        None => bail!("Usage: coredump-server <image> (or set COREDUMP_IMAGE)"),
    }
}
