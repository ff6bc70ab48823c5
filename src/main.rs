#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # lydia-device
//!
//! Serial-to-WebSocket gateway for the `msh` laser controller shell.
//!
//! Mediates between the device's half-duplex, prompt-framed serial shell and
//! any number of WebSocket clients: it serializes command execution against
//! the single serial link, enforces a command allowlist, polls `status` at a
//! bounded rate and fans out only changed snapshots, and appends every
//! command attempt to a durable audit log.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use lydia_device::audit::{AuditConfig, AuditHandle};
use lydia_device::config::Config;
use lydia_device::serial::SerialSession;
use lydia_device::state::AppState;
use lydia_device::telemetry::TelemetryHub;
use lydia_device::{poll, ws};

#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() {
    let config = Config::load();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "lydia_device=info,tower_http=info".into()),
        )
        .init();

    info!("lydia-device v{} starting", env!("CARGO_PKG_VERSION"));
    info!("serial device: {} @ {} baud", config.serial, config.baud);
    info!("listening on {}:{}", config.host, config.port);
    info!("poll rate: {} Hz", config.hz);

    let session = match SerialSession::open(&config.serial, config.baud) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("failed to open serial device {}: {e}", config.serial);
            std::process::exit(1);
        }
    };

    let audit = match AuditHandle::start(AuditConfig::new(config.audit_path.clone())).await {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(
                "failed to start audit sink at {}: {e} — continuing without an audit trail",
                config.audit_path
            );
            None
        }
    };

    let hub = Arc::new(TelemetryHub::new());
    let poll_task = poll::spawn(session.clone(), hub.clone(), config.hz);

    let state = AppState {
        config: Arc::new(config.clone()),
        start_time: Instant::now(),
        session,
        hub,
        audit: audit.clone(),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws::ws_upgrade))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    info!("gateway ready");

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => info!("received SIGINT"),
                _ = sigterm.recv() => info!("received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("received SIGINT");
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!("server error: {e}");
    }

    info!("shutting down...");
    poll_task.abort();
    if let Some(handle) = audit {
        handle.stop().await;
    }
    info!("goodbye");
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "subscribers": state.hub.subscriber_count().await,
    }))
}
