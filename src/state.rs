//! Shared application state passed to every handler via Axum's `State` extractor.

use std::sync::Arc;
use std::time::Instant;

use crate::audit::AuditHandle;
use crate::config::Config;
use crate::serial::SerialSession;
use crate::telemetry::TelemetryHub;

/// Shared gateway state.
///
/// `session` is generic-free here: the production binary only ever runs
/// against a real [`tokio_serial::SerialStream`], so `AppState` is pinned to
/// that concrete transport. The generic [`SerialSession`] itself stays
/// transport-agnostic for tests.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup.
    pub config: Arc<Config>,
    /// Monotonic instant the gateway started, for uptime reporting.
    pub start_time: Instant,
    /// The single serialized connection to the device's `msh` shell.
    pub session: Arc<SerialSession<tokio_serial::SerialStream>>,
    /// Telemetry subscriber registry and change-detection fingerprint.
    pub hub: Arc<TelemetryHub>,
    /// Audit sink. `None` when auditing failed to start; callers still run,
    /// just without a durability trail.
    pub audit: Option<AuditHandle>,
}
