#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::unused_async)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::redundant_closure_for_method_calls)]

//! lydia-device library — the serial-to-websocket gateway engine.
//!
//! This library re-exports the key building blocks:
//! - `config` — CLI/env configuration loading
//! - `policy` — command allowlist
//! - `serial` — prompt-framed request/response session over a serial link
//! - `parsers` — status/process/getall output parsers
//! - `audit` — durable append-only audit log
//! - `telemetry` — debounced fan-out hub
//! - `poll` — periodic status poller
//! - `wire` — client/server wire message types and CBOR framing
//! - `ws` — per-connection WebSocket handler
//! - `state` — shared application state

pub mod audit;
pub mod config;
pub mod parsers;
pub mod policy;
pub mod poll;
pub mod serial;
pub mod state;
pub mod telemetry;
pub mod wire;
pub mod ws;

pub use config::Config;
pub use serial::SerialSession;
pub use state::AppState;
pub use telemetry::TelemetryHub;
