//! Logging and the side health endpoint (SPEC_FULL.md §3.1, §3.4). Grounded
//! on `libs/rust/core/src/lib.rs::init_tracing`/`start_health_server`,
//! trimmed of the OTLP/Prometheus exporter pipeline this single polling
//! loop has no use for. The bare `/` route is carried over from
//! `original_source/src/httpserver.py`.

use anyhow::Result;
use axum::{routing::get, Router};
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Installs the process-wide `tracing` subscriber. Idempotent — safe to call
/// more than once (tests call it per-module). `RUST_LOG` always wins if
/// set; otherwise `debug` lowers the default filter from `info` to `debug`.
pub fn init_tracing(debug: bool) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let default_level = if debug { "debug" } else { "info" };
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()?;
        Ok(())
    })?;
    Ok(())
}

/// Binds the side health endpoint (spec.md §1, §6 `PORT0`) and serves it in
/// the background so it never blocks the supervisor loop.
pub async fn start_health_server(port: u16) -> Result<()> {
    let app = Router::new().route("/healthz", get(|| async { "ok" })).route("/", get(|| async { "ok" }));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(?addr, "health server listening");
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(error = %err, "health server failed");
        }
    });
    Ok(())
}
